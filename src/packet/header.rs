//! TNS packet header encoding/decoding
//!
//! The TNS packet header is 8 bytes:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! | Length (2 or 4) | Pkt Checksum(2) | Type(1)| Flags(1)| Hdr Checksum(2)|
//! +--------+--------+--------+--------+--------+--------+--------+--------+
//! ```
//!
//! Once the handshake has completed with protocol version >= 315 the length is
//! 4 bytes (big-endian u32) and absorbs the packet checksum. Before that it is
//! 2 bytes followed by a zero checksum.

use crate::buffer::WriteBuffer;
use crate::constants::{PacketType, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};

/// TNS packet header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Total packet length including header
    pub length: u32,
    /// Packet type
    pub packet_type: PacketType,
    /// Packet flags
    pub flags: u8,
}

impl PacketHeader {
    /// Create a new packet header
    pub fn new(packet_type: PacketType, length: u32) -> Self {
        Self {
            length,
            packet_type,
            flags: 0,
        }
    }

    /// Read only the length field of a raw header
    pub fn peek_length(data: &[u8; PACKET_HEADER_SIZE], large_sdu: bool) -> u32 {
        if large_sdu {
            u32::from_be_bytes([data[0], data[1], data[2], data[3]])
        } else {
            u16::from_be_bytes([data[0], data[1]]) as u32
        }
    }

    /// Parse a packet header from raw bytes
    ///
    /// Unknown packet types surface as [`Error::UnexpectedPacket`].
    pub fn parse(data: &[u8], large_sdu: bool) -> Result<Self> {
        if data.len() < PACKET_HEADER_SIZE {
            return Err(Error::BufferUnderflow {
                needed: PACKET_HEADER_SIZE,
                available: data.len(),
            });
        }
        let mut raw = [0u8; PACKET_HEADER_SIZE];
        raw.copy_from_slice(&data[..PACKET_HEADER_SIZE]);
        let length = Self::peek_length(&raw, large_sdu);
        if (length as usize) < PACKET_HEADER_SIZE {
            return Err(Error::protocol(format!("packet length {} shorter than header", length)));
        }
        Ok(Self {
            length,
            packet_type: PacketType::try_from(raw[4])?,
            flags: raw[5],
        })
    }

    /// Write a packet header to a buffer
    pub fn write(&self, buf: &mut WriteBuffer, large_sdu: bool) {
        if large_sdu {
            buf.write_u32_be(self.length);
        } else {
            buf.write_u16_be(self.length as u16);
            buf.write_u16_be(0);
        }
        buf.write_u8(self.packet_type as u8);
        buf.write_u8(self.flags);
        buf.write_u16_be(0);
    }

    /// Get the payload length (total length minus header)
    pub fn payload_length(&self) -> usize {
        (self.length as usize).saturating_sub(PACKET_HEADER_SIZE)
    }
}
