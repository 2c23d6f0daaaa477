//! TNS and TTC protocol constants
//!
//! Packet types, marker codes, TTC message and function codes, capability
//! indices and the LOB operation numbering used on the wire.

// =============================================================================
// Packet Types
// =============================================================================

/// TNS packet types (found in packet header byte 4)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Connect request from client
    Connect = 1,
    /// Server accepts connection
    Accept = 2,
    /// Acknowledge
    Ack = 3,
    /// Server refuses connection
    Refuse = 4,
    /// Server redirects to a different address
    Redirect = 5,
    /// Data packet carrying TTC messages
    Data = 6,
    /// Null packet
    Null = 7,
    /// Abort connection
    Abort = 9,
    /// Request to resend every packet of the current call
    Resend = 11,
    /// Marker packet (break/reset/interrupt)
    Marker = 12,
    /// Attention packet
    Attention = 13,
    /// Control packet
    Control = 14,
}

impl TryFrom<u8> for PacketType {
    type Error = crate::error::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Accept),
            3 => Ok(PacketType::Ack),
            4 => Ok(PacketType::Refuse),
            5 => Ok(PacketType::Redirect),
            6 => Ok(PacketType::Data),
            7 => Ok(PacketType::Null),
            9 => Ok(PacketType::Abort),
            11 => Ok(PacketType::Resend),
            12 => Ok(PacketType::Marker),
            13 => Ok(PacketType::Attention),
            14 => Ok(PacketType::Control),
            _ => Err(crate::error::Error::UnexpectedPacket(value)),
        }
    }
}

// =============================================================================
// Packet Flags
// =============================================================================

/// Packet flags (header byte 5)
#[allow(missing_docs)]
pub mod packet_flags {
    pub const REDIRECT: u8 = 0x02;
    pub const TLS_RENEG: u8 = 0x08;
    pub const DATA_RENEG: u8 = 0x80;
}

/// Data flags (first 2 bytes of a DATA packet payload)
#[allow(missing_docs)]
pub mod data_flags {
    pub const EOF: u16 = 0x0040;
    pub const TLS_RENEG: u16 = 0x8000;
}

// =============================================================================
// Marker Types
// =============================================================================

/// Marker codes carried in the last byte of a MARKER packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MarkerType {
    /// Break the current call
    Break = 1,
    /// Reset after a break
    Reset = 2,
    /// Client interrupt request
    Interrupt = 3,
}

// =============================================================================
// TTC Message Codes
// =============================================================================

/// Message codes found at the start of TTC messages
#[allow(missing_docs)]
pub mod message {
    pub const PROTOCOL: u8 = 1;
    pub const DATA_TYPES: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const SUMMARY: u8 = 4;
    pub const PARAMETER: u8 = 8;
    pub const STATUS: u8 = 9;
    pub const LOB_DATA: u8 = 14;
    pub const WARNING: u8 = 15;
    pub const PIGGYBACK: u8 = 17;
    pub const SERVER_SIDE_PIGGYBACK: u8 = 23;
}

/// TTC function codes
#[allow(missing_docs)]
pub mod function {
    pub const LOB_OP: u8 = 0x60;
    pub const AUTH_PHASE_TWO: u8 = 0x73;
    pub const AUTH_PHASE_ONE: u8 = 0x76;
    pub const CLOSE_TEMP_LOBS: u8 = 0x93;
}

// =============================================================================
// Handshake
// =============================================================================

/// TNS protocol versions
#[allow(missing_docs)]
pub mod version {
    pub const DESIRED: u16 = 319;
    pub const MINIMUM: u16 = 300;
    /// From this version on the header carries a 4-byte length
    pub const MIN_LARGE_SDU: u16 = 315;
}

/// Connect packet defaults
#[allow(missing_docs)]
pub mod connection {
    pub const DEFAULT_SDU: u32 = 8192;
    pub const DEFAULT_TDU: u32 = 65535;
    pub const PROTOCOL_CHARACTERISTICS: u16 = 0x4f98;
    pub const MAX_CONNECT_DATA: usize = 230;
    /// Bytes reserved per data packet for framing
    pub const SEGMENT_OVERHEAD: u32 = 64;
}

/// Service options advertised in CONNECT
#[allow(missing_docs)]
pub mod service_options {
    pub const DONT_CARE: u16 = 0x0001;
    pub const CAN_RECV_ATTENTION: u16 = 0x0400;
}

/// NSI flags
#[allow(missing_docs)]
pub mod nsi_flags {
    pub const DISABLE_NA: u8 = 0x04;
    pub const NA_REQUIRED: u8 = 0x10;
    pub const SUPPORT_SECURITY_RENEG: u8 = 0x80;
}

// =============================================================================
// Authentication
// =============================================================================

/// Logon mode bits
#[allow(missing_docs)]
pub mod auth_mode {
    pub const NO_NEW_PASS: u32 = 0x0001;
    pub const SYSDBA: u32 = 0x0020;
    pub const SYSOPER: u32 = 0x0040;
    pub const USER_AND_PASS: u32 = 0x0100;
}

/// Password verifier types announced in AUTH_VFR_DATA
#[allow(missing_docs)]
pub mod verifier_type {
    pub const O3LOGON: u32 = 2361;
    pub const O5LOGON: u32 = 6949;
    pub const PBKDF2: u32 = 18453;
}

// =============================================================================
// Charsets
// =============================================================================

/// Charset ids
#[allow(missing_docs)]
pub mod charset {
    pub const US7ASCII: u16 = 1;
    pub const WE8ISO8859P1: u16 = 31;
    pub const AL32UTF8: u16 = 873;
    pub const AL16UTF16: u16 = 2000;
}

/// Charset form
#[allow(missing_docs)]
pub mod csfrm {
    pub const IMPLICIT: u8 = 1;
    pub const NCHAR: u8 = 2;
}

// =============================================================================
// Capability Indices
// =============================================================================

/// Compile-time capability indices
#[allow(missing_docs)]
pub mod ccap_index {
    pub const SQL_VERSION: usize = 0;
    pub const LOGON_TYPES: usize = 4;
    pub const FIELD_VERSION: usize = 7;
    pub const TTC1: usize = 15;
    pub const OCI1: usize = 16;
    pub const UB2_DTY: usize = 27;
    pub const TTC3: usize = 37;
}

/// Runtime capability indices
#[allow(missing_docs)]
pub mod rcap_index {
    pub const COMPAT: usize = 0;
    pub const TIMEZONE: usize = 1;
}

// =============================================================================
// TNS Length Indicators
// =============================================================================

/// Clr length indicators
pub mod length {
    /// Longest byte string written inline
    pub const MAX_SHORT: u8 = 252;
    /// Escape, treated as nil
    pub const ESCAPE_CHAR: u8 = 253;
    /// Chunked form follows
    pub const LONG_INDICATOR: u8 = 254;
    /// NULL value
    pub const NULL_INDICATOR: u8 = 255;
}

// =============================================================================
// LOB Operations
// =============================================================================

/// LOB operation codes (TTC function 0x60)
#[allow(missing_docs)]
pub mod lob_op {
    pub const GET_SIZE: u32 = 0x0001;
    pub const READ: u32 = 0x0002;
    pub const COPY: u32 = 0x0004;
    pub const WRITE: u32 = 0x0040;
    pub const APPEND: u32 = 0x0080;
    pub const FILE_OPEN: u32 = 0x0100;
    pub const FILE_CLOSE: u32 = 0x0200;
    pub const CREATE_TEMP: u32 = 0x0110;
    pub const FREE_TEMP: u32 = 0x0111;
    pub const EXISTS: u32 = 0x0800;
    pub const OPEN: u32 = 0x8000;
    pub const CLOSE: u32 = 0x10000;
    pub const FREE_ALL_TEMP: u32 = 0x80111;
}

/// LOB open modes
#[allow(missing_docs)]
pub mod lob_mode {
    pub const READ_ONLY: u32 = 1;
    pub const READ_WRITE: u32 = 2;
}

// =============================================================================
// Object / Collection Images
// =============================================================================

/// Pickle image flags and markers
#[allow(missing_docs)]
pub mod obj_flags {
    pub const IS_VERSION_81: u8 = 0x80;
    pub const IS_DEGENERATE: u8 = 0x10;
    pub const IS_COLLECTION: u8 = 0x08;
    pub const NO_PREFIX_SEG: u8 = 0x04;
    pub const IMAGE_VERSION: u8 = 1;
    pub const MAX_SHORT_LENGTH: u8 = 245;
    pub const ATOMIC_NULL: u8 = 253;
    pub const NULL: u8 = 255;
    pub const HAS_INDEXES: u8 = 0x10;
}

/// Collection type codes
pub mod collection_type {
    /// PL/SQL INDEX BY table
    pub const INDEX_BY: u8 = 1;
    /// Nested table
    pub const NESTED_TABLE: u8 = 2;
    /// VARRAY
    pub const VARRAY: u8 = 3;
}

// =============================================================================
// Error Codes
// =============================================================================

/// Server error codes the core reacts to
#[allow(missing_docs)]
pub mod error_code {
    pub const NO_DATA_FOUND: u32 = 1403;
    pub const DEFAULT_REFUSE: u32 = 12564;
}

// =============================================================================
// Packet Header
// =============================================================================

/// TNS packet header size in bytes
pub const PACKET_HEADER_SIZE: usize = 8;
