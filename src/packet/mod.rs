//! TNS packet encoding/decoding
//!
//! This module handles the TNS packet layer: the 8-byte header, DATA packet
//! flags, MARKER packets, and segmentation of an outgoing TTC request into
//! data packets that fit the negotiated session data unit.

mod header;

pub use header::PacketHeader;

use bytes::Bytes;

use crate::buffer::WriteBuffer;
use crate::constants::{connection, MarkerType, PacketType, PACKET_HEADER_SIZE};
use crate::error::{Error, Result};

/// A complete TNS packet with header and payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The packet header
    pub header: PacketHeader,
    /// Data flags, present on DATA packets only
    pub data_flags: Option<u16>,
    /// Everything after the header (and after the data flags for DATA)
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet of any type with a raw payload
    pub fn new(packet_type: PacketType, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            header: PacketHeader::new(packet_type, (PACKET_HEADER_SIZE + payload.len()) as u32),
            data_flags: None,
            payload,
        }
    }

    /// Create a DATA packet
    pub fn data(payload: impl Into<Bytes>, data_flags: u16) -> Self {
        let payload = payload.into();
        Self {
            header: PacketHeader::new(PacketType::Data, (PACKET_HEADER_SIZE + 2 + payload.len()) as u32),
            data_flags: Some(data_flags),
            payload,
        }
    }

    /// Create a MARKER packet
    pub fn marker(marker: MarkerType) -> Self {
        Self::new(PacketType::Marker, vec![1u8, 0, marker as u8])
    }

    /// Decode a packet from its raw bytes (header included)
    pub fn from_bytes(data: Bytes, large_sdu: bool) -> Result<Self> {
        let header = PacketHeader::parse(&data, large_sdu)?;
        let end = (header.length as usize).min(data.len());
        let mut payload = data.slice(PACKET_HEADER_SIZE..end);
        let mut data_flags = None;
        if header.packet_type == PacketType::Data {
            if payload.len() < 2 {
                return Err(Error::protocol("data packet without data flags"));
            }
            data_flags = Some(u16::from_be_bytes([payload[0], payload[1]]));
            payload = payload.slice(2..);
        }
        Ok(Self {
            header,
            data_flags,
            payload,
        })
    }

    /// Encode the packet to bytes
    pub fn to_bytes(&self, large_sdu: bool) -> Bytes {
        let mut buf = WriteBuffer::new();
        self.header.write(&mut buf, large_sdu);
        if let Some(flags) = self.data_flags {
            buf.write_u16_be(flags);
        }
        buf.write_bytes(&self.payload);
        buf.take()
    }

    /// Get the packet type
    pub fn packet_type(&self) -> PacketType {
        self.header.packet_type
    }

    /// Packet flags from the header
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    /// Marker code of a MARKER packet
    pub fn marker_type(&self) -> Option<u8> {
        if self.header.packet_type != PacketType::Marker {
            return None;
        }
        self.payload.get(2).copied()
    }
}

/// Split an outgoing request into DATA packets of at most `sdu - 64` bytes
///
/// An empty request still produces one empty DATA packet.
pub fn segment(data: &[u8], sdu: u32) -> Vec<Packet> {
    if data.is_empty() {
        return vec![Packet::data(Bytes::new(), 0)];
    }
    let segment_len = sdu.saturating_sub(connection::SEGMENT_OVERHEAD).max(1) as usize;
    data.chunks(segment_len)
        .map(|chunk| Packet::data(Bytes::copy_from_slice(chunk), 0))
        .collect()
}
