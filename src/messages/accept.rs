//! ACCEPT message
//!
//! Packet structure (after 8-byte TNS header):
//! ```text
//! Offset | Size | Description
//! -------+------+------------------
//!      0 |    2 | Protocol version
//!      2 |    2 | Service options
//!      4 |    2 | SDU size (16-bit)
//!      6 |    2 | TDU size (16-bit)
//!      8 |    2 | Hardware byte order
//!     10 |    2 | Data length (accept data)
//!     12 |    2 | Data offset (from packet start)
//!     14 |    1 | Connect flags 0 (NSI flags)
//!     15 |    1 | Connect flags 1
//!     16 |    8 | Reserved
//!     24 |    4 | SDU size (32-bit, if version >= 315)
//!     28 |    4 | TDU size (32-bit, if version >= 315)
//! ```

use crate::buffer::ReadBuffer;
use crate::constants::{version, PacketType, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::packet::Packet;

/// Parsed ACCEPT message from server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptMessage {
    /// Negotiated protocol version
    pub protocol_version: u16,
    /// Service options from server
    pub service_options: u16,
    /// Negotiated SDU (already capped by the TDU)
    pub sdu: u32,
    /// Negotiated TDU size
    pub tdu: u32,
    /// Server NSI flags
    pub flags: u8,
    /// Accept data (if any)
    pub accept_data: Vec<u8>,
}

impl AcceptMessage {
    /// Parse an ACCEPT packet from the server
    pub fn parse(packet: &Packet) -> Result<Self> {
        if packet.packet_type() != PacketType::Accept {
            return Err(Error::UnexpectedPacket(packet.packet_type() as u8));
        }

        let mut buf = ReadBuffer::from_slice(&packet.payload);
        let protocol_version = buf.read_u16_be()?;
        if protocol_version < version::MINIMUM {
            return Err(Error::protocol(format!(
                "server protocol version {} is older than {}",
                protocol_version,
                version::MINIMUM
            )));
        }
        let service_options = buf.read_u16_be()?;
        let mut sdu = buf.read_u16_be()? as u32;
        let mut tdu = buf.read_u16_be()? as u32;
        buf.skip(2)?;
        let data_length = buf.read_u16_be()? as usize;
        let data_offset = buf.read_u16_be()? as usize;
        let flags = buf.read_u8()?;
        buf.skip(1)?;

        if protocol_version >= version::MIN_LARGE_SDU {
            buf.skip(8)?;
            sdu = buf.read_u32_be()?;
            tdu = buf.read_u32_be()?;
        }
        if tdu < sdu {
            sdu = tdu;
        }

        let accept_data = if data_length > 0 {
            let start = data_offset.saturating_sub(PACKET_HEADER_SIZE);
            packet
                .payload
                .get(start..start + data_length)
                .map(|d| d.to_vec())
                .ok_or_else(|| Error::protocol("accept data runs past the packet"))?
        } else {
            Vec::new()
        };

        Ok(Self {
            protocol_version,
            service_options,
            sdu,
            tdu,
            flags,
            accept_data,
        })
    }

    /// Check if the negotiated version supports large SDU (4-byte length)
    pub fn uses_large_sdu(&self) -> bool {
        self.protocol_version >= version::MIN_LARGE_SDU
    }
}
