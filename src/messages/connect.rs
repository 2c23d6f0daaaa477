//! CONNECT message
//!
//! Packet structure (after 8-byte TNS header):
//! ```text
//! Offset | Size | Description
//! -------+------+------------------
//!      0 |    2 | Protocol version (desired)
//!      2 |    2 | Protocol version (minimum)
//!      4 |    2 | Service options
//!      6 |    2 | SDU size
//!      8 |    2 | TDU size
//!     10 |    2 | Protocol characteristics
//!     12 |    2 | Line turnaround (0)
//!     14 |    2 | Value of 1
//!     16 |    2 | Connect data length
//!     18 |    2 | Connect data offset
//!     20 |    4 | Max receivable data (0)
//!     24 |    1 | NSI flags 1
//!     25 |    1 | NSI flags 2
//!     26 |   24 | Reserved (zeros)
//!     50 |    4 | SDU (large)
//!     54 |    4 | TDU (large)
//!     58 |    4 | Connect flags 1
//!     62 |    4 | Connect flags 2
//!     66 |    n | Connect data (inline when at most 230 bytes)
//! ```
//!
//! Longer connect descriptors travel in a DATA packet right after CONNECT.

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::config::ConnectionConfig;
use crate::constants::{
    connection, nsi_flags, service_options, version, PacketType, PACKET_HEADER_SIZE,
};
use crate::packet::Packet;

/// Payload bytes before the connect data
const FIXED_PAYLOAD_LEN: usize = 66;

/// Connect message sent to initiate a connection
#[derive(Debug, Clone)]
pub struct ConnectMessage {
    /// Desired protocol version
    pub version_desired: u16,
    /// Minimum acceptable protocol version
    pub version_minimum: u16,
    /// Service options flags
    pub service_options: u16,
    /// Session Data Unit size
    pub sdu: u32,
    /// Transport Data Unit size
    pub tdu: u32,
    /// NSI flags
    pub nsi_flags: u8,
    /// Connect descriptor
    pub connect_data: String,
}

impl ConnectMessage {
    /// Create a CONNECT message from configuration
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::with_descriptor(config, config.connect_descriptor())
    }

    /// Create a CONNECT message carrying an explicit descriptor (used after a redirect)
    pub fn with_descriptor(config: &ConnectionConfig, connect_data: String) -> Self {
        Self {
            version_desired: version::DESIRED,
            version_minimum: version::MINIMUM,
            service_options: service_options::DONT_CARE | service_options::CAN_RECV_ATTENTION,
            sdu: config.sdu,
            tdu: config.tdu,
            nsi_flags: nsi_flags::SUPPORT_SECURITY_RENEG | nsi_flags::DISABLE_NA,
            connect_data,
        }
    }

    /// Whether the descriptor needs its own DATA packet
    pub fn needs_continuation(&self) -> bool {
        self.connect_data.len() > connection::MAX_CONNECT_DATA
    }

    /// Build the CONNECT packet and, for long descriptors, the trailing DATA packet
    pub fn build(&self) -> (Packet, Option<Packet>) {
        let data = self.connect_data.as_bytes();
        let mut buf = WriteBuffer::new();
        buf.write_u16_be(self.version_desired);
        buf.write_u16_be(self.version_minimum);
        buf.write_u16_be(self.service_options);
        buf.write_u16_be(self.sdu.min(0xFFFF) as u16);
        buf.write_u16_be(self.tdu.min(0xFFFF) as u16);
        buf.write_u16_be(connection::PROTOCOL_CHARACTERISTICS);
        buf.write_u16_be(0);
        buf.write_u16_be(1);
        buf.write_u16_be(data.len() as u16);
        buf.write_u16_be((PACKET_HEADER_SIZE + FIXED_PAYLOAD_LEN) as u16);
        buf.write_u32_be(0);
        buf.write_u8(self.nsi_flags);
        buf.write_u8(self.nsi_flags);
        buf.write_zeros(24);
        buf.write_u32_be(self.sdu);
        buf.write_u32_be(self.tdu);
        buf.write_u32_be(0);
        buf.write_u32_be(0);

        if self.needs_continuation() {
            let connect = Packet::new(PacketType::Connect, buf.take());
            let follow = Packet::data(Bytes::copy_from_slice(data), 0);
            (connect, Some(follow))
        } else {
            buf.write_bytes(data);
            (Packet::new(PacketType::Connect, buf.take()), None)
        }
    }
}
