//! LOB streaming against a mock LOB server
//!
//! The server keeps LOB contents keyed by locator and answers the TTC LOB
//! calls the way a TTC 6 server lays them out.

mod common;

use std::collections::HashMap;

use common::*;
use oracle_tns::buffer::{ReadBuffer, WriteBuffer};
use oracle_tns::constants::{charset, csfrm, function, lob_mode, lob_op, message};
use oracle_tns::types::LobLocator;
use oracle_tns::{Error, LobStream};
use tokio::net::TcpStream;

/// One decoded LOB request
#[derive(Debug, Default)]
struct LobRequest {
    op: u32,
    locator: Vec<u8>,
    dest: Vec<u8>,
    charset_id: Option<u16>,
    null_o2u: bool,
    scn: Vec<u32>,
    source_offset: u64,
    dest_offset: u64,
    size: Option<u64>,
    data: Option<Vec<u8>>,
}

fn parse_lob_request(request: &[u8]) -> LobRequest {
    let mut buf = function_body(request, function::LOB_OP);
    let has_source = buf.read_u8().unwrap() == 1;
    let source_len = buf.read_ub4().unwrap() as usize;
    let has_dest = buf.read_u8().unwrap() == 1;
    let dest_len = buf.read_ub4().unwrap() as usize;
    assert_eq!(buf.read_u8().unwrap(), 0);
    assert_eq!(buf.read_u8().unwrap(), 0);
    let has_charset = buf.read_u8().unwrap() == 1;
    assert_eq!(buf.read_u8().unwrap(), 0, "old send-size flag");
    let null_o2u = buf.read_u8().unwrap() == 1;
    let op = buf.read_ub4().unwrap();
    let has_scn = buf.read_u8().unwrap() == 1;
    let scn_len = buf.read_ub4().unwrap() as usize;
    let source_offset = buf.read_ub8().unwrap();
    let dest_offset = buf.read_ub8().unwrap();
    let send_size = buf.read_u8().unwrap() == 1;
    buf.skip(6).unwrap();

    let locator = if has_source {
        buf.read_bytes_vec(source_len).unwrap()
    } else {
        Vec::new()
    };
    let dest = if has_dest {
        buf.read_bytes_vec(dest_len).unwrap()
    } else {
        Vec::new()
    };
    let charset_id = has_charset.then(|| buf.read_ub2().unwrap());
    let scn = if has_scn {
        (0..scn_len).map(|_| buf.read_ub4().unwrap()).collect()
    } else {
        Vec::new()
    };
    let size = send_size.then(|| buf.read_ub8().unwrap());
    let data = if op == lob_op::WRITE {
        assert_eq!(buf.read_u8().unwrap(), message::LOB_DATA);
        Some(buf.read_clr().unwrap())
    } else {
        None
    };
    assert_eq!(buf.remaining(), 0, "trailing request bytes");

    LobRequest {
        op,
        locator,
        dest,
        charset_id,
        null_o2u,
        scn,
        source_offset,
        dest_offset,
        size,
        data,
    }
}

/// Mock server side of the LOB calls
#[derive(Default)]
struct LobServer {
    contents: HashMap<Vec<u8>, Vec<u8>>,
    next_id: u8,
    ops: Vec<u32>,
}

impl LobServer {
    fn handle(&mut self, req: LobRequest) -> Vec<u8> {
        self.ops.push(req.op);
        let mut out = WriteBuffer::new();
        match req.op {
            lob_op::CREATE_TEMP => {
                assert_eq!(req.locator.len(), 40);
                assert_eq!(req.locator[1], 0x54);
                assert_eq!(req.scn, vec![0]);
                assert_eq!(req.size, Some(10));
                assert!(req.null_o2u);
                self.next_id += 1;
                let mut locator = req.locator.clone();
                locator[7] |= 0x01;
                locator[10] = self.next_id;
                self.contents.insert(locator.clone(), Vec::new());
                out.write_u8(message::PARAMETER);
                out.write_bytes(&locator);
                out.write_ub2(req.charset_id.unwrap());
                out.write_ub8(10);
                out.write_ub2(0);
            }
            lob_op::WRITE => {
                let content = self.contents.get_mut(&req.locator).unwrap();
                let start = (req.source_offset - 1) as usize;
                let data = req.data.unwrap();
                if content.len() < start + data.len() {
                    content.resize(start + data.len(), 0);
                }
                content[start..start + data.len()].copy_from_slice(&data);
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
            }
            lob_op::READ => {
                let Some(content) = self.contents.get(&req.locator) else {
                    out.write_bytes(&summary(SummaryFlags::negotiated(), 22275, "ORA-22275: invalid LOB locator specified"));
                    return out.as_slice().to_vec();
                };
                let start = ((req.source_offset - 1) as usize).min(content.len());
                let end = match req.size {
                    Some(0) | None => content.len(),
                    Some(n) => (start + n as usize).min(content.len()),
                };
                out.write_u8(message::LOB_DATA);
                out.write_clr(&content[start..end]);
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
                out.write_ub8((end - start) as u64);
            }
            lob_op::GET_SIZE => {
                let len = self.contents[&req.locator].len();
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
                out.write_ub8(len as u64);
            }
            lob_op::EXISTS => {
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
                out.write_ub2(self.contents.contains_key(&req.locator) as u16);
            }
            lob_op::COPY => {
                let source = self.contents[&req.locator].clone();
                let from = (req.source_offset - 1) as usize;
                let count = req.size.unwrap() as usize;
                let dest = self.contents.get_mut(&req.dest).unwrap();
                let at = (req.dest_offset - 1) as usize;
                if dest.len() < at + count {
                    dest.resize(at + count, 0);
                }
                dest[at..at + count].copy_from_slice(&source[from..from + count]);
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
                out.write_bytes(&req.dest);
                out.write_ub8(count as u64);
            }
            lob_op::APPEND => {
                let source = self.contents[&req.locator].clone();
                self.contents.get_mut(&req.dest).unwrap().extend_from_slice(&source);
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
                out.write_bytes(&req.dest);
            }
            lob_op::FREE_TEMP => {
                self.contents.remove(&req.locator);
                out.write_u8(message::PARAMETER);
                out.write_bytes(&req.locator);
            }
            other => panic!("unexpected LOB operation {:#x}", other),
        }
        out.write_bytes(&summary(SummaryFlags::negotiated(), 0, ""));
        out.as_slice().to_vec()
    }

    async fn serve(&mut self, stream: &mut TcpStream, calls: usize) {
        for _ in 0..calls {
            let request = read_request(stream, 8192).await;
            let reply = self.handle(parse_lob_request(&request));
            send_data(stream, &reply).await;
        }
    }
}

#[tokio::test]
async fn test_write_read_size_roundtrip() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        serve_negotiation(&mut stream, 8192).await;
        let mut lobs = LobServer::default();
        lobs.serve(&mut stream, 7).await;
        lobs.ops
    });

    let mut session = negotiated_session(port).await;
    let mut blob = LobStream::create_temporary(&mut session, 0, 0).await.unwrap();
    assert!(blob.locator().is_temporary());
    assert_eq!(blob.locator().len(), 40);

    blob.write(&mut session, 0, b"hello, large object").await.unwrap();
    blob.write(&mut session, 7, b"LARGE").await.unwrap();
    assert_eq!(blob.get_size(&mut session).await.unwrap(), 19);
    assert_eq!(blob.read(&mut session, 0, 0).await.unwrap(), b"hello, LARGE object".to_vec());
    assert_eq!(blob.read(&mut session, 7, 5).await.unwrap(), b"LARGE".to_vec());
    blob.free_temporary(&mut session).await.unwrap();
    assert!(blob.locator().is_empty());

    let ops = server.await.unwrap();
    assert_eq!(
        ops,
        vec![
            lob_op::CREATE_TEMP,
            lob_op::WRITE,
            lob_op::WRITE,
            lob_op::GET_SIZE,
            lob_op::READ,
            lob_op::READ,
            lob_op::FREE_TEMP,
        ]
    );
}

#[tokio::test]
async fn test_clob_text_and_copy() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        serve_negotiation(&mut stream, 8192).await;
        let mut lobs = LobServer::default();
        lobs.serve(&mut stream, 8).await;
        lobs.contents
    });

    let mut session = negotiated_session(port).await;
    let mut clob = LobStream::create_temporary(&mut session, charset::AL32UTF8, csfrm::IMPLICIT)
        .await
        .unwrap();
    assert_eq!(clob.charset_id(), charset::AL32UTF8);
    clob.write_string(&mut session, 0, "grüße").await.unwrap();
    assert_eq!(clob.read_string(&mut session, 0, 0).await.unwrap(), "grüße");
    assert!(clob.exists(&mut session).await.unwrap());

    let mut other = LobStream::create_temporary(&mut session, charset::AL32UTF8, csfrm::IMPLICIT)
        .await
        .unwrap();
    other.write_string(&mut session, 0, ">>").await.unwrap();
    clob.append_to(&mut session, other.locator()).await.unwrap();
    clob.copy(&mut session, other.locator(), 1, 3, 2).await.unwrap();

    let contents = server.await.unwrap();
    let mut values: Vec<_> = contents.values().cloned().collect();
    values.sort();
    assert_eq!(values, vec![">>grüße".as_bytes().to_vec(), "grüße".as_bytes().to_vec()]);
}

#[tokio::test]
async fn test_server_error_fails_call() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        serve_negotiation(&mut stream, 8192).await;
        let mut lobs = LobServer::default();
        lobs.serve(&mut stream, 1).await;
    });

    let mut session = negotiated_session(port).await;
    let mut lob = LobStream::new(LobLocator::new(vec![7; 40]));
    let err = lob.read(&mut session, 0, 10).await.unwrap_err();
    assert!(matches!(err, Error::OracleError { code: 22275, .. }));
    server.await.unwrap();
}

#[tokio::test]
async fn test_open_temporary_stays_local() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        serve_negotiation(&mut stream, 8192).await;
        let mut lobs = LobServer::default();
        lobs.serve(&mut stream, 1).await;
        lobs.ops
    });

    let mut session = negotiated_session(port).await;
    let mut lob = LobStream::create_temporary(&mut session, 0, 0).await.unwrap();
    lob.open(&mut session, lob_mode::READ_WRITE, lob_op::OPEN).await.unwrap();
    assert_eq!(lob.locator().as_bytes()[7] & 0x10, 0x10);

    // only the create call reached the server
    assert_eq!(server.await.unwrap(), vec![lob_op::CREATE_TEMP]);
}

#[tokio::test]
async fn test_free_all_temporary_batches() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut stream = accept_client(&listener, 8192).await;
        serve_negotiation(&mut stream, 8192).await;
        let request = read_request(&mut stream, 8192).await;
        send_data(&mut stream, &summary(SummaryFlags::negotiated(), 0, "")).await;
        request
    });

    let mut session = negotiated_session(port).await;
    let locators: Vec<_> = (1..=3u8).map(|i| LobLocator::new(vec![i; 40])).collect();
    LobStream::free_all_temporary(&mut session, &locators).await.unwrap();

    let request = server.await.unwrap();
    let mut buf = ReadBuffer::from_slice(&request);
    assert_eq!(buf.read_u8().unwrap(), message::PIGGYBACK);
    assert_eq!(buf.read_u8().unwrap(), function::LOB_OP);
    assert_eq!(buf.read_u8().unwrap(), 0);
    assert_eq!(buf.read_u8().unwrap(), 1);
    assert_eq!(buf.read_ub4().unwrap(), 120);
    buf.skip(7).unwrap();
    assert_eq!(buf.read_ub4().unwrap(), lob_op::FREE_ALL_TEMP);
    buf.skip(11).unwrap();
    for i in 1..=3u8 {
        assert_eq!(buf.read_bytes_vec(40).unwrap(), vec![i; 40]);
    }
    assert_eq!(buf.read_bytes_vec(3).unwrap(), vec![3, function::CLOSE_TEMP_LOBS, 0]);
    assert_eq!(buf.remaining(), 0);
}
