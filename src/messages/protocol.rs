//! Protocol negotiation message
//!
//! The Protocol message is exchanged after the CONNECT/ACCEPT handshake to
//! negotiate the TTC (Two-Task Common) protocol version, the database charsets
//! and the server capabilities.
//!
//! Request structure:
//! ```text
//! Offset | Size | Description
//! -------+------+------------------
//!      0 |    1 | Message type (1 = Protocol)
//!      1 |    1 | Protocol version (6)
//!      2 |    1 | Array terminator (0)
//!      3 |    n | Driver name (null-terminated string)
//! ```
//!
//! Response structure:
//! ```text
//! Size | Description
//! -----+------------------------------------------
//!    1 | Message type (1)
//!    1 | Server version (4, 5 or 6)
//!    1 | Zero byte
//!    n | Server banner (null-terminated, <= 50 bytes)
//!    2 | Character set ID (LE)
//!    1 | Server flags
//!    2 | Number of charset elements (LE), 5 bytes each
//!    2 | FDO length (BE)
//!    n | FDO data (contains ncharset_id)
//!  1+n | Compile capabilities (length-prefixed)
//!  1+n | Runtime capabilities (length-prefixed)
//! ```

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::capabilities::Capabilities;
use crate::constants::message;
use crate::error::{Error, Result};
use crate::session::Session;

/// Longest banner accepted before the terminating NUL
const MAX_BANNER_LENGTH: usize = 50;

/// Protocol negotiation response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolMessage {
    /// Server protocol version byte
    pub server_version: u8,
    /// Oracle release the version byte maps to
    pub oracle_version: u32,
    /// Server banner string
    pub server_banner: String,
    /// Database charset
    pub charset_id: u16,
    /// National charset taken from the FDO
    pub ncharset_id: u16,
    /// Server flags
    pub server_flags: u8,
    /// Server compile-time capabilities
    pub server_compile_caps: Vec<u8>,
    /// Server runtime capabilities
    pub server_runtime_caps: Vec<u8>,
}

impl ProtocolMessage {
    /// Write the request body
    pub fn write_request(buf: &mut WriteBuffer, driver_name: &str) {
        buf.write_u8(message::PROTOCOL);
        // protocol version 8.1 and higher
        buf.write_u8(6);
        buf.write_u8(0);
        buf.write_bytes(driver_name.as_bytes());
        buf.write_u8(0);
    }

    /// Decode the response, message code included
    pub fn parse_response(buf: &mut ReadBuffer) -> Result<Self> {
        let code = buf.read_u8()?;
        if code != message::PROTOCOL {
            return Err(Error::UnexpectedMessage {
                code,
                context: "protocol negotiation",
            });
        }
        let server_version = buf.read_u8()?;
        let oracle_version = match server_version {
            4 => 7230,
            5 => 8030,
            6 => 8100,
            other => return Err(Error::UnsupportedServerVersion(other)),
        };
        buf.skip(1)?;
        let server_banner = buf.read_null_term_string(MAX_BANNER_LENGTH)?;
        let charset_id = buf.read_u16_le()?;
        let server_flags = buf.read_u8()?;
        let elements = buf.read_u16_le()? as usize;
        if elements > 0 {
            buf.skip(elements * 5)?;
        }

        let fdo_length = buf.read_u16_be()? as usize;
        let fdo = buf.read_bytes_vec(fdo_length)?;
        let ncharset_id = national_charset(&fdo)?;

        let length = buf.read_u8()? as usize;
        let server_compile_caps = buf.read_bytes_vec(length)?;
        let length = buf.read_u8()? as usize;
        let server_runtime_caps = buf.read_bytes_vec(length)?;

        Ok(Self {
            server_version,
            oracle_version,
            server_banner,
            charset_id,
            ncharset_id,
            server_flags,
            server_compile_caps,
            server_runtime_caps,
        })
    }

    /// Store the negotiated values; bit 2 of the server flags is forced on
    pub fn apply(self, caps: &mut Capabilities) {
        caps.protocol_server_version = self.server_version;
        caps.server_compile_version = self.oracle_version;
        caps.server_banner = self.server_banner;
        caps.charset_id = self.charset_id;
        caps.ncharset_id = self.ncharset_id;
        caps.server_flags = self.server_flags | 2;
        caps.set_server_caps(self.server_compile_caps, self.server_runtime_caps);
    }
}

/// National charset id at `fdo[6 + fdo[5] + fdo[6] + 3..+5]`
fn national_charset(fdo: &[u8]) -> Result<u16> {
    let short = || Error::protocol(format!("FDO too short ({} bytes)", fdo.len()));
    if fdo.len() < 7 {
        return Err(short());
    }
    let offset = 6 + fdo[5] as usize + fdo[6] as usize;
    let bytes = fdo.get(offset + 3..offset + 5).ok_or_else(short)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Run TCP negotiation and record the server's answer in the capabilities
pub async fn negotiate_protocol(session: &mut Session) -> Result<()> {
    session.reset_buffer();
    let driver_name = session.config().client.driver_name.clone();
    ProtocolMessage::write_request(session.output(), &driver_name);
    session.write().await?;

    let response = session.decode(ProtocolMessage::parse_response).await?;
    session.tracer().print(&format!(
        "Server version: {} banner: {}",
        response.oracle_version, response.server_banner
    ));
    tracing::debug!(
        target: "oracle_tns",
        version = response.oracle_version,
        charset = response.charset_id,
        ncharset = response.ncharset_id,
        "protocol negotiated"
    );
    response.apply(session.capabilities_mut());
    session.apply_capabilities();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_bytes(version: u8, ccaps: &[u8]) -> Vec<u8> {
        let mut w = WriteBuffer::new();
        w.write_u8(1);
        w.write_u8(version);
        w.write_u8(0);
        w.write_bytes(b"x86_64/Linux 2.4.xx\0");
        w.write_u16_le(873);
        w.write_u8(1);
        w.write_u16_le(1);
        w.write_zeros(5);
        let mut fdo = vec![0u8; 7];
        fdo[5] = 1;
        fdo[6] = 2;
        fdo.extend_from_slice(&[0, 0, 0, 0, 0, 0x07, 0xD0, 0]);
        w.write_u16_be(fdo.len() as u16);
        w.write_bytes(&fdo);
        w.write_u8(ccaps.len() as u8);
        w.write_bytes(ccaps);
        w.write_u8(2);
        w.write_bytes(&[2, 1]);
        w.as_slice().to_vec()
    }

    #[test]
    fn test_write_request() {
        let mut buf = WriteBuffer::new();
        ProtocolMessage::write_request(&mut buf, "oracle-tns");
        assert_eq!(buf.as_slice(), b"\x01\x06\x00oracle-tns\x00");
    }

    #[test]
    fn test_parse_response() {
        let mut ccaps = vec![0u8; 40];
        ccaps[15] = 1;
        let mut buf = ReadBuffer::from_vec(response_bytes(6, &ccaps));
        let msg = ProtocolMessage::parse_response(&mut buf).unwrap();
        assert_eq!(msg.oracle_version, 8100);
        assert_eq!(msg.server_banner, "x86_64/Linux 2.4.xx");
        assert_eq!(msg.charset_id, 873);
        assert_eq!(msg.ncharset_id, 2000);
        assert_eq!(buf.remaining(), 0);

        let mut caps = Capabilities::new();
        msg.apply(&mut caps);
        assert_eq!(caps.server_flags, 3);
        assert!(caps.has_eos);
        assert!(!caps.has_fsap);
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = ReadBuffer::from_vec(response_bytes(7, &[]));
        assert!(matches!(
            ProtocolMessage::parse_response(&mut buf),
            Err(Error::UnsupportedServerVersion(7))
        ));
    }

    #[test]
    fn test_wrong_message_code() {
        let mut buf = ReadBuffer::from_vec(vec![2, 6]);
        assert!(matches!(
            ProtocolMessage::parse_response(&mut buf),
            Err(Error::UnexpectedMessage { code: 2, .. })
        ));
    }
}
