//! Connection capabilities negotiation
//!
//! This module holds the compile-time (CCAP) and runtime (RCAP) capability
//! arrays exchanged during TCP and data-type negotiation, together with the
//! flags derived from them. Once data-type negotiation finishes the derived
//! flags are fixed for the lifetime of the session.

use crate::buffer::StreamOptions;
use crate::constants::{ccap_index, charset, rcap_index};
use crate::summary::WireContext;

/// Client compile-time capabilities sent during data-type negotiation
pub const CLIENT_COMPILE_CAPS: [u8; 38] = [
    6, 1, 0, 0, 10, 1, 1, 6, 1, 1, 1, 1, 1, 1, 0, 0x29, 0x90, 3, 7, 3, 0, 1, 0, 0x6B, 1, 0, 5, 1, 0,
    0, 0, 0, 0, 0, 0, 0, 1, 2,
];

/// Client runtime capabilities sent during data-type negotiation
pub const CLIENT_RUNTIME_CAPS: [u8; 7] = [2, 1, 0, 0, 0, 0, 0];

/// Bit in `ccaps[TTC3]` advertising big Clr chunks
const BIG_CHUNK_CLR: u8 = 0x02;

/// Bit in `rcaps[TIMEZONE]` asking for the client time zone
const RCAP_TIMEZONE: u8 = 0x01;

/// Capabilities negotiated between client and server
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Server protocol version byte from TCP negotiation
    pub protocol_server_version: u8,
    /// Oracle release mapped from the protocol version (7230, 8030 or 8100)
    pub server_compile_version: u32,
    /// Server banner
    pub server_banner: String,
    /// Server flags (bit 2 is forced on after TCP negotiation)
    pub server_flags: u8,
    /// Database character set id
    pub charset_id: u16,
    /// National character set id
    pub ncharset_id: u16,
    /// Server compile-time capabilities
    pub server_compile_caps: Vec<u8>,
    /// Server runtime capabilities
    pub server_runtime_caps: Vec<u8>,
    /// Client compile-time capabilities, after fixups
    pub compile_caps: Vec<u8>,
    /// Client runtime capabilities
    pub runtime_caps: Vec<u8>,
    /// Summary messages carry the end-of-call status
    pub has_eos: bool,
    /// Summary messages carry the end-to-end ECID sequence
    pub has_fsap: bool,
    /// Chunk lengths in Clr values are compressed u32s
    pub use_big_clr_chunks: bool,
    /// Negotiated TTC field version
    pub ttc_version: u8,
    /// Database time zone bytes returned by data-type negotiation
    pub db_timezone: Vec<u8>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new()
    }
}

impl Capabilities {
    /// Create capabilities with the client defaults and no server data
    pub fn new() -> Self {
        Self {
            protocol_server_version: 0,
            server_compile_version: 0,
            server_banner: String::new(),
            server_flags: 0,
            charset_id: charset::AL32UTF8,
            ncharset_id: charset::AL16UTF16,
            server_compile_caps: Vec::new(),
            server_runtime_caps: Vec::new(),
            compile_caps: CLIENT_COMPILE_CAPS.to_vec(),
            runtime_caps: CLIENT_RUNTIME_CAPS.to_vec(),
            has_eos: false,
            has_fsap: false,
            use_big_clr_chunks: false,
            ttc_version: 0,
            db_timezone: Vec::new(),
        }
    }

    /// Record the server capabilities received by TCP negotiation
    pub(crate) fn set_server_caps(&mut self, compile_caps: Vec<u8>, runtime_caps: Vec<u8>) {
        self.has_eos = compile_caps.get(ccap_index::TTC1).map_or(false, |b| b & 1 == 1);
        self.has_fsap = compile_caps.get(ccap_index::OCI1).map_or(false, |b| b & 1 == 1);
        self.server_compile_caps = compile_caps;
        self.server_runtime_caps = runtime_caps;
    }

    /// Clear client capability bits the server cannot honour
    ///
    /// Without server support for big Clr chunks (or with caps too short to
    /// say) the client bit must be cleared, otherwise every later Clr read
    /// desynchronizes. Likewise the two-byte type-rep table needs server
    /// `ccaps[27]`.
    pub(crate) fn apply_server_fixups(&mut self) {
        let server = &self.server_compile_caps;
        let big_chunks = server.len() > ccap_index::TTC3
            && server[ccap_index::TTC3] & BIG_CHUNK_CLR == BIG_CHUNK_CLR;
        if !big_chunks {
            self.compile_caps[ccap_index::TTC3] = 0;
            self.compile_caps[1] = 0;
        }
        let ub2_dty = server.len() > ccap_index::UB2_DTY && server[ccap_index::UB2_DTY] != 0;
        if !ub2_dty {
            self.compile_caps[ccap_index::UB2_DTY] = 0;
        }
    }

    /// Freeze the derived flags once data types are negotiated
    pub(crate) fn finish_negotiation(&mut self) {
        let client = self.compile_caps[ccap_index::FIELD_VERSION];
        self.ttc_version = match self.server_compile_caps.get(ccap_index::FIELD_VERSION) {
            Some(&server) => client.min(server),
            None => client,
        };
        self.use_big_clr_chunks = self.compile_caps[ccap_index::TTC3] & BIG_CHUNK_CLR != 0;
    }

    /// Type-rep table entries are written as u16 instead of single bytes
    pub fn uses_ub2_type_reps(&self) -> bool {
        self.compile_caps[ccap_index::UB2_DTY] != 0
    }

    /// Big Clr chunks are advertised by the (fixed-up) client caps
    pub fn advertises_big_chunks(&self) -> bool {
        self.compile_caps[ccap_index::TTC3] & BIG_CHUNK_CLR != 0
    }

    /// The client time zone travels with data-type negotiation
    pub fn sends_timezone(&self) -> bool {
        self.runtime_caps[rcap_index::TIMEZONE] & RCAP_TIMEZONE != 0
    }

    /// The server only understands the pre-11g type representations
    pub fn server_is_pre_11g(&self) -> bool {
        self.server_compile_caps.get(ccap_index::FIELD_VERSION) == Some(&5)
    }

    /// Whether the server asks for PKCS5 padding of the O5LOGON session key
    ///
    /// Caps too short to carry the logon byte mean no padding.
    pub fn logon_padding(&self) -> bool {
        match self.server_compile_caps.get(ccap_index::LOGON_TYPES) {
            Some(&b) => b & 2 == 0,
            None => false,
        }
    }

    /// Flags needed to decode summaries and status messages
    pub fn wire(&self) -> WireContext {
        WireContext {
            has_eos: self.has_eos,
            has_fsap: self.has_fsap,
        }
    }

    /// Stream options matching the negotiated Clr chunk format
    pub fn stream_options(&self) -> StreamOptions {
        if self.use_big_clr_chunks {
            StreamOptions::big_chunks()
        } else {
            StreamOptions::default()
        }
    }
}
