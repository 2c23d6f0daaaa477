//! Mock TNS listener shared by the integration tests
//!
//! The mock speaks just enough of the packet layer to drive a real
//! [`Session`] over loopback TCP: it answers CONNECT with ACCEPT and then
//! exchanges raw packets. Negotiated sessions use protocol version 319, so
//! every packet after ACCEPT carries a 4-byte length.

#![allow(dead_code)]

use std::time::Duration;

use oracle_tns::buffer::{ReadBuffer, WriteBuffer};
use oracle_tns::constants::{connection, PacketType, PACKET_HEADER_SIZE};
use oracle_tns::{ConnectionConfig, Session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Protocol version the mock accepts with
pub const MOCK_VERSION: u16 = 319;

/// A raw packet as seen by the mock
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub packet_type: u8,
    pub flags: u8,
    /// Everything after the header (DATA flags included)
    pub body: Vec<u8>,
}

impl RawPacket {
    /// DATA payload without the two flag bytes
    pub fn data(&self) -> &[u8] {
        assert_eq!(self.packet_type, PacketType::Data as u8, "not a DATA packet");
        &self.body[2..]
    }
}

pub async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

pub fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::new("127.0.0.1", port, "FREEPDB1", "scott", "tiger").timeout(Duration::from_secs(5))
}

pub async fn read_packet(stream: &mut TcpStream, large_sdu: bool) -> RawPacket {
    let mut head = [0u8; PACKET_HEADER_SIZE];
    stream.read_exact(&mut head).await.unwrap();
    let length = if large_sdu {
        u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize
    } else {
        u16::from_be_bytes([head[0], head[1]]) as usize
    };
    let mut body = vec![0u8; length - PACKET_HEADER_SIZE];
    stream.read_exact(&mut body).await.unwrap();
    RawPacket {
        packet_type: head[4],
        flags: head[5],
        body,
    }
}

pub fn encode_packet(packet_type: PacketType, flags: u8, body: &[u8], large_sdu: bool) -> Vec<u8> {
    let length = PACKET_HEADER_SIZE + body.len();
    let mut raw = Vec::with_capacity(length);
    if large_sdu {
        raw.extend_from_slice(&(length as u32).to_be_bytes());
    } else {
        raw.extend_from_slice(&(length as u16).to_be_bytes());
        raw.extend_from_slice(&[0, 0]);
    }
    raw.extend_from_slice(&[packet_type as u8, flags, 0, 0]);
    raw.extend_from_slice(body);
    raw
}

pub async fn send_packet(stream: &mut TcpStream, packet_type: PacketType, body: &[u8]) {
    let raw = encode_packet(packet_type, 0, body, true);
    stream.write_all(&raw).await.unwrap();
}

/// Send a DATA packet after the handshake
pub async fn send_data(stream: &mut TcpStream, payload: &[u8]) {
    let mut body = vec![0u8, 0];
    body.extend_from_slice(payload);
    send_packet(stream, PacketType::Data, &body).await;
}

pub async fn send_marker(stream: &mut TcpStream, marker: u8) {
    send_packet(stream, PacketType::Marker, &[1, 0, marker]).await;
}

pub fn accept_body(version: u16, sdu: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&version.to_be_bytes());
    body.extend_from_slice(&0x0400u16.to_be_bytes());
    body.extend_from_slice(&(sdu.min(0xFFFF) as u16).to_be_bytes());
    body.extend_from_slice(&0xFFFFu16.to_be_bytes());
    body.extend_from_slice(&[0, 0]); // hardware byte order
    body.extend_from_slice(&[0, 0]); // accept data length
    body.extend_from_slice(&[0, 0]); // accept data offset
    body.extend_from_slice(&[0x04, 0x04]);
    body.extend_from_slice(&[0; 8]);
    body.extend_from_slice(&sdu.to_be_bytes());
    body.extend_from_slice(&0x0020_0000u32.to_be_bytes());
    body
}

/// Read CONNECT (and its descriptor packet, when split off) and answer ACCEPT
///
/// Returns the connect descriptor the client sent.
pub async fn accept(stream: &mut TcpStream, sdu: u32) -> String {
    let connect = read_packet(stream, false).await;
    assert_eq!(connect.packet_type, PacketType::Connect as u8);
    let data_len = u16::from_be_bytes([connect.body[16], connect.body[17]]) as usize;
    let descriptor = if data_len > connection::MAX_CONNECT_DATA {
        let follow = read_packet(stream, false).await;
        follow.data().to_vec()
    } else {
        connect.body[connect.body.len() - data_len..].to_vec()
    };
    let raw = encode_packet(PacketType::Accept, 0, &accept_body(MOCK_VERSION, sdu), false);
    stream.write_all(&raw).await.unwrap();
    String::from_utf8(descriptor).unwrap()
}

/// Accept one client and complete the handshake
pub async fn accept_client(listener: &TcpListener, sdu: u32) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    accept(&mut stream, sdu).await;
    stream
}

/// Read one complete request made of DATA packets
///
/// The session splits requests at `sdu - 64`; a packet shorter than that
/// ends the request.
pub async fn read_request(stream: &mut TcpStream, sdu: u32) -> Vec<u8> {
    let segment = (sdu - connection::SEGMENT_OVERHEAD) as usize;
    let mut request = Vec::new();
    loop {
        let pck = read_packet(stream, true).await;
        let data = pck.data().to_vec();
        let len = data.len();
        request.extend_from_slice(&data);
        if len < segment {
            return request;
        }
    }
}

/// Server compile-time caps: EOS, FSAP, two-byte type reps and big Clr
/// chunks, TTC field version `field_version`
pub fn server_compile_caps(field_version: u8) -> Vec<u8> {
    let mut caps = vec![0u8; 40];
    caps[7] = field_version;
    caps[15] = 1;
    caps[16] = 1;
    caps[27] = 1;
    caps[37] = 2;
    caps
}

/// TCP negotiation reply announcing AL32UTF8 / AL16UTF16
pub fn protocol_reply(server_version: u8, compile_caps: &[u8]) -> Vec<u8> {
    let mut out = WriteBuffer::new();
    out.write_u8(1);
    out.write_u8(server_version);
    out.write_u8(0);
    out.write_bytes(b"x86_64/Linux 2.4.xx\0");
    out.write_u16_le(873);
    out.write_u8(1);
    out.write_u16_le(0);
    let mut fdo = vec![0u8; 11];
    fdo[9] = 0x07;
    fdo[10] = 0xD0;
    out.write_u16_be(fdo.len() as u16);
    out.write_bytes(&fdo);
    out.write_u8(compile_caps.len() as u8);
    out.write_bytes(compile_caps);
    out.write_u8(2);
    out.write_bytes(&[2, 1]);
    out.as_slice().to_vec()
}

/// Data-types reply with a time zone, the big-chunk word and one
/// two-byte type rep entry
pub fn data_types_reply() -> Vec<u8> {
    let mut out = vec![2u8];
    out.extend_from_slice(&[0x80, 0, 0, 0, 0x3c, 0x3c, 0x80, 0, 0, 0, 0]);
    out.extend_from_slice(&[0, 0, 0, 0]);
    out.extend_from_slice(&[0, 1, 0, 1, 0, 1, 0, 0]);
    out.extend_from_slice(&[0, 0]);
    out
}

/// Serve both negotiation round trips for a client using the full caps
pub async fn serve_negotiation(stream: &mut TcpStream, sdu: u32) {
    let request = read_request(stream, sdu).await;
    assert_eq!(&request[..3], &[1, 6, 0]);
    send_data(stream, &protocol_reply(6, &server_compile_caps(6))).await;

    let request = read_request(stream, sdu).await;
    assert_eq!(request[0], 2);
    send_data(stream, &data_types_reply()).await;
}

/// Connect a session to the mock and run both negotiations
pub async fn negotiated_session(port: u16) -> Session {
    let mut session = Session::new(config(port));
    session.connect().await.unwrap();
    oracle_tns::messages::negotiate_protocol(&mut session).await.unwrap();
    oracle_tns::messages::negotiate_data_types(&mut session).await.unwrap();
    session
}

/// Wire flags a summary is encoded for
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryFlags {
    pub has_eos: bool,
    pub has_fsap: bool,
}

impl SummaryFlags {
    pub fn negotiated() -> Self {
        Self {
            has_eos: true,
            has_fsap: true,
        }
    }
}

/// Summary message (code 4 included) with the given return code
pub fn summary(flags: SummaryFlags, ret_code: u16, message: &str) -> Vec<u8> {
    let mut out = WriteBuffer::new();
    out.write_u8(4);
    if flags.has_eos {
        out.write_ub4(0);
    }
    if flags.has_fsap {
        out.write_ub2(0);
    }
    out.write_ub4(0); // current row
    out.write_ub2(ret_code);
    for _ in 0..4 {
        out.write_ub2(0);
    }
    out.write_u8(0); // sql type
    out.write_u8(0); // fatal
    out.write_ub2(0); // flags
    out.write_ub1(0);
    out.write_ub1(0);
    out.write_ub1(0);
    out.write_ub4(0); // rba
    out.write_ub2(0);
    out.write_ub1(0);
    out.write_ub4(0);
    out.write_ub2(0);
    out.write_ub4(0); // os error
    out.write_ub1(0);
    out.write_ub1(0);
    out.write_ub2(0);
    out.write_ub4(0); // success iterations
    out.write_ub4(0); // oerrdd
    out.write_ub2(0); // batch errors
    out.write_ub4(0); // batch offsets
    out.write_ub2(0); // batch messages
    if ret_code != 0 {
        out.write_clr(message.as_bytes());
    }
    out.as_slice().to_vec()
}

/// Parse a request with a ReadBuffer, skipping the `3, func, seq` prefix
pub fn function_body(request: &[u8], function: u8) -> ReadBuffer {
    assert_eq!(request[0], 3, "not a function call");
    assert_eq!(request[1], function, "unexpected function code");
    let mut buf = ReadBuffer::from_slice(request);
    buf.skip(3).unwrap();
    buf
}
