//! REFUSE message
//!
//! Packet structure (after 8-byte TNS header):
//! ```text
//! Offset | Size | Description
//! -------+------+------------------
//!      0 |    1 | User reason
//!      1 |    1 | System reason
//!      2 |    2 | Data length
//!      4 |    n | Data (error message)
//! ```
//!
//! The data usually looks like `(DESCRIPTION=(ERR=12514)(VSNNUM=...))`. When
//! no `ERR` is present the code comes from an `(ERROR=...(CODE=n)...)` block,
//! and failing that it defaults to 12564 (connection refused).

use crate::buffer::ReadBuffer;
use crate::constants::{error_code, PacketType};
use crate::error::{Error, Result};
use crate::packet::Packet;

/// Parsed REFUSE message from server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefuseMessage {
    /// User reason byte
    pub user_reason: u8,
    /// System reason byte
    pub system_reason: u8,
    /// Raw message from the listener
    pub message: String,
    /// Extracted error code
    pub error_code: u32,
}

impl RefuseMessage {
    /// Parse a REFUSE packet from the server
    pub fn parse(packet: &Packet) -> Result<Self> {
        if packet.packet_type() != PacketType::Refuse {
            return Err(Error::UnexpectedPacket(packet.packet_type() as u8));
        }
        let mut buf = ReadBuffer::from_slice(&packet.payload);
        let user_reason = buf.read_u8()?;
        let system_reason = buf.read_u8()?;
        let data_length = buf.read_u16_be()? as usize;
        let message = if data_length > 0 && buf.has_remaining(data_length) {
            buf.read_string(data_length)?
        } else {
            String::new()
        };
        let error_code = extract_error_code(&message);
        Ok(Self {
            user_reason,
            system_reason,
            message,
            error_code,
        })
    }

    /// Convert the refusal into an error
    pub fn into_error(self) -> Error {
        Error::ConnectionRefused {
            error_code: self.error_code,
            message: self.message,
        }
    }
}

/// Digits right after `key` in a whitespace-free message
fn number_after(msg: &str, key: &str) -> Option<u32> {
    let pos = msg.find(key)?;
    let digits: String = msg[pos + key.len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn extract_error_code(message: &str) -> u32 {
    let msg: String = message
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(code) = number_after(&msg, "(ERR=") {
        return code;
    }
    if let Some(pos) = msg.find("(ERROR=") {
        if let Some(code) = number_after(&msg[pos..], "CODE=") {
            return code;
        }
    }
    error_code::DEFAULT_REFUSE
}
