//! REDIRECT message
//!
//! Packet structure (after 8-byte TNS header):
//! ```text
//! Offset | Size | Description
//! -------+------+------------------
//!      0 |    2 | Data length
//!      2 |    n | Redirect data (address [NUL reconnect data])
//! ```
//!
//! A REDIRECT whose packet holds nothing past the length field carries its
//! data in the DATA packet that follows. When the packet flag 0x02 is set the
//! data splits at the first NUL into the new address and reconnect data.

use crate::buffer::ReadBuffer;
use crate::config::DEFAULT_PORT;
use crate::constants::{packet_flags, PacketType};
use crate::error::{Error, Result};
use crate::packet::Packet;

/// Parsed REDIRECT message from server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectMessage {
    /// The new address to connect to
    pub address: String,
    /// Connect descriptor to send to the new address
    pub reconnect_data: Option<String>,
}

impl RedirectMessage {
    /// Redirect data carried inline, or `None` when it follows in a DATA packet
    pub fn inline_data(packet: &Packet) -> Result<Option<Vec<u8>>> {
        if packet.packet_type() != PacketType::Redirect {
            return Err(Error::UnexpectedPacket(packet.packet_type() as u8));
        }
        if packet.payload.len() <= 2 {
            return Ok(None);
        }
        let mut buf = ReadBuffer::from_slice(&packet.payload);
        let data_length = buf.read_u16_be()? as usize;
        let available = buf.remaining().min(data_length);
        Ok(Some(buf.read_bytes_vec(available)?))
    }

    /// Build the message from its data and the REDIRECT packet flags
    pub fn from_data(data: &[u8], flags: u8) -> Self {
        let text = String::from_utf8_lossy(data);
        match text.find('\0') {
            Some(nul) if flags & packet_flags::REDIRECT != 0 && nul > 0 => {
                let rest = &text[nul + 1..];
                Self {
                    address: text[..nul].to_string(),
                    reconnect_data: (!rest.is_empty()).then(|| rest.to_string()),
                }
            }
            _ => Self {
                address: text.trim_end_matches('\0').to_string(),
                reconnect_data: None,
            },
        }
    }

    /// Host and port named in the address
    pub fn host_port(&self) -> Option<(String, u16)> {
        let host = descriptor_value(&self.address, "HOST")?;
        let port = descriptor_value(&self.address, "PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        Some((host, port))
    }

    /// Convert into the error surfaced to callers when no reconnect happens
    pub fn into_error(self) -> Error {
        Error::ConnectionRedirect {
            address: self.address,
            reconnect_data: self.reconnect_data,
        }
    }
}

/// Value of `(KEY=value)` in a connect descriptor, case-insensitive on the key
fn descriptor_value(descriptor: &str, key: &str) -> Option<String> {
    let upper = descriptor.to_ascii_uppercase();
    let needle = format!("({}=", key);
    let start = upper.find(&needle)? + needle.len();
    let end = descriptor[start..].find(')')?;
    let value = descriptor[start..start + end].trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect_packet(data: &[u8], flags: u8) -> Packet {
        let mut payload = (data.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(data);
        let mut packet = Packet::new(PacketType::Redirect, payload);
        packet.header.flags = flags;
        packet
    }

    #[test]
    fn test_redirect_with_reconnect_data() {
        let address = "(ADDRESS=(PROTOCOL=TCP)(HOST=192.168.1.100)(PORT=1522))";
        let reconnect = "(DESCRIPTION=(CONNECT_DATA=(SERVICE_NAME=ORCL)))";
        let data = format!("{}\0{}", address, reconnect);
        let packet = redirect_packet(data.as_bytes(), packet_flags::REDIRECT);

        let inline = RedirectMessage::inline_data(&packet).unwrap().unwrap();
        let redirect = RedirectMessage::from_data(&inline, packet.flags());
        assert_eq!(redirect.address, address);
        assert_eq!(redirect.reconnect_data.as_deref(), Some(reconnect));
        assert_eq!(redirect.host_port(), Some(("192.168.1.100".to_string(), 1522)));
    }

    #[test]
    fn test_redirect_without_flag_keeps_whole_data() {
        let data = b"(ADDRESS=(HOST=a)(PORT=1))\0rest";
        let redirect = RedirectMessage::from_data(data, 0);
        assert_eq!(redirect.address, "(ADDRESS=(HOST=a)(PORT=1))\0rest");
        assert!(redirect.reconnect_data.is_none());
    }

    #[test]
    fn test_redirect_data_in_next_packet() {
        let packet = redirect_packet(b"", 0);
        assert!(RedirectMessage::inline_data(&packet).unwrap().is_none());
    }

    #[test]
    fn test_host_port_defaults() {
        let redirect = RedirectMessage::from_data(b"(address=(protocol=tcp)(host=db1))", 0);
        assert_eq!(redirect.host_port(), Some(("db1".to_string(), 1521)));
        let redirect = RedirectMessage::from_data(b"garbage", 0);
        assert!(redirect.host_port().is_none());
    }
}
