//! Binary value stream for TTC encoding/decoding
//!
//! [`ReadBuffer`] and [`WriteBuffer`] implement the primitive encodings every
//! TTC message is built from: compressed integers, Clr/Dlc byte strings and
//! key/value/flag triples. Both carry the negotiated [`StreamOptions`] since
//! the Clr chunk format depends on them.

mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;

/// Default chunk size used when writing chunked Clr values
pub const DEFAULT_CLR_CHUNK_SIZE: usize = 0x40;

/// Chunk size used once big Clr chunks are negotiated
pub const BIG_CLR_CHUNK_SIZE: usize = 0x7FFF;

/// Negotiated options that change the shape of the value stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Chunk lengths are compressed u32 values instead of single bytes
    pub use_big_clr_chunks: bool,
    /// Maximum chunk size for chunked Clr writes
    pub clr_chunk_size: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            use_big_clr_chunks: false,
            clr_chunk_size: DEFAULT_CLR_CHUNK_SIZE,
        }
    }
}

impl StreamOptions {
    /// Options after the server agreed to big Clr chunks
    pub fn big_chunks() -> Self {
        Self {
            use_big_clr_chunks: true,
            clr_chunk_size: BIG_CLR_CHUNK_SIZE,
        }
    }
}
