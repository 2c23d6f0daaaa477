//! Write buffer for encoding TTC data
//!
//! Writes never fail: the buffer grows as needed and the session splits it
//! into data packets afterwards.

use bytes::{BufMut, Bytes, BytesMut};

use super::StreamOptions;
use crate::constants::length;
use crate::error::{Error, Result};

/// A buffer for writing TTC protocol data
#[derive(Debug, Clone)]
pub struct WriteBuffer {
    /// The underlying byte buffer
    data: BytesMut,
    options: StreamOptions,
}

impl WriteBuffer {
    /// Create a new WriteBuffer with default capacity
    pub fn new() -> Self {
        Self::with_options(StreamOptions::default())
    }

    /// Create a buffer that writes Clr values with the given options
    pub fn with_options(options: StreamOptions) -> Self {
        Self {
            data: BytesMut::with_capacity(8192),
            options,
        }
    }

    /// Replace the stream options
    pub fn set_options(&mut self, options: StreamOptions) {
        self.options = options;
    }

    /// Current stream options
    pub fn options(&self) -> StreamOptions {
        self.options
    }

    /// Get the current length of data in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents as a byte slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Take the written bytes, leaving the buffer empty
    pub fn take(&mut self) -> Bytes {
        self.data.split().freeze()
    }

    // =========================================================================
    // Raw byte writes
    // =========================================================================

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Write zeros
    pub fn write_zeros(&mut self, n: usize) {
        self.data.put_bytes(0, n);
    }

    /// Write a 16-bit unsigned integer in big-endian format
    pub fn write_u16_be(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    /// Write a 16-bit unsigned integer in little-endian format
    pub fn write_u16_le(&mut self, value: u16) {
        self.data.put_u16_le(value);
    }

    /// Write a 32-bit unsigned integer in big-endian format
    pub fn write_u32_be(&mut self, value: u32) {
        self.data.put_u32(value);
    }

    /// Write a 64-bit unsigned integer in big-endian format
    pub fn write_u64_be(&mut self, value: u64) {
        self.data.put_u64(value);
    }

    // =========================================================================
    // TTC integer writes
    // =========================================================================

    /// Write an unsigned integer
    ///
    /// A `size` of 1 always writes one raw byte. Compressed values are written
    /// as a length byte followed by the big-endian bytes with leading zeros
    /// trimmed; zero is a single `0`. Uncompressed values take exactly `size`
    /// bytes in the given endianness.
    pub fn write_uint(&mut self, value: u64, size: usize, big_endian: bool, compress: bool) {
        if size == 1 {
            self.write_u8(value as u8);
            return;
        }
        if compress {
            self.write_compressed(value, false);
            return;
        }
        self.write_fixed(value, size, big_endian);
    }

    /// Write a signed integer
    ///
    /// Compressed negatives set bit 0x80 of the length byte and write the
    /// magnitude.
    pub fn write_int(&mut self, value: i64, size: usize, big_endian: bool, compress: bool) {
        if compress {
            self.write_compressed(value.unsigned_abs(), value < 0);
            return;
        }
        if size == 1 {
            self.write_u8(value as u8);
            return;
        }
        self.write_fixed(value as u64, size, big_endian);
    }

    fn write_compressed(&mut self, magnitude: u64, negative: bool) {
        if magnitude == 0 {
            self.write_u8(0);
            return;
        }
        let bytes = magnitude.to_be_bytes();
        let skip = (magnitude.leading_zeros() / 8) as usize;
        let len = (8 - skip) as u8;
        self.write_u8(if negative { len | 0x80 } else { len });
        self.write_bytes(&bytes[skip..]);
    }

    fn write_fixed(&mut self, value: u64, size: usize, big_endian: bool) {
        let size = size.min(8);
        if big_endian {
            self.write_bytes(&value.to_be_bytes()[8 - size..]);
        } else {
            self.write_bytes(&value.to_le_bytes()[..size]);
        }
    }

    /// Write a TTC UB1
    #[inline]
    pub fn write_ub1(&mut self, value: u8) {
        self.write_u8(value)
    }

    /// Write a compressed 2-byte integer
    pub fn write_ub2(&mut self, value: u16) {
        self.write_uint(value as u64, 2, true, true)
    }

    /// Write a compressed 4-byte integer
    pub fn write_ub4(&mut self, value: u32) {
        self.write_uint(value as u64, 4, true, true)
    }

    /// Write a compressed signed 4-byte integer
    pub fn write_sb4(&mut self, value: i32) {
        self.write_int(value as i64, 4, true, true)
    }

    /// Write a compressed 8-byte integer
    pub fn write_ub8(&mut self, value: u64) {
        self.write_uint(value, 8, true, true)
    }

    // =========================================================================
    // Byte strings
    // =========================================================================

    /// Write a Clr byte string
    ///
    /// Up to 252 bytes are written inline. Longer values use `0xFE`, then
    /// chunks of `clr_chunk_size`, each with a one-byte length (or a compressed
    /// u32 length once big chunks are negotiated), then a zero terminator.
    pub fn write_clr(&mut self, data: &[u8]) {
        if data.is_empty() {
            self.write_u8(0);
        } else if data.len() <= length::MAX_SHORT as usize {
            self.write_u8(data.len() as u8);
            self.write_bytes(data);
        } else {
            self.write_u8(length::LONG_INDICATOR);
            let chunk_size = if self.options.use_big_clr_chunks {
                self.options.clr_chunk_size.max(1)
            } else {
                self.options.clr_chunk_size.clamp(1, 0xFF)
            };
            for chunk in data.chunks(chunk_size) {
                if self.options.use_big_clr_chunks {
                    self.write_ub4(chunk.len() as u32);
                } else {
                    self.write_u8(chunk.len() as u8);
                }
                self.write_bytes(chunk);
            }
            self.write_u8(0);
        }
    }

    /// Write a fixed Clr: inline length, or `0xFE` and a 4-byte big-endian length
    pub fn write_fixed_clr(&mut self, data: &[u8]) {
        if data.len() > length::MAX_SHORT as usize {
            self.write_u8(length::LONG_INDICATOR);
            self.write_u32_be(data.len() as u32);
        } else {
            self.write_u8(data.len() as u8);
        }
        self.write_bytes(data);
    }

    /// Write a key/value/flag triple
    pub fn write_key_val(&mut self, key: &[u8], val: &[u8], flag: u32) {
        for part in [key, val] {
            if part.is_empty() {
                self.write_u8(0);
            } else {
                self.write_ub4(part.len() as u32);
                self.write_clr(part);
            }
        }
        self.write_ub4(flag);
    }

    /// String form of [`write_key_val`](Self::write_key_val)
    pub fn write_key_val_str(&mut self, key: &str, val: &str, flag: u32) {
        self.write_key_val(key.as_bytes(), val.as_bytes(), flag)
    }

    // =========================================================================
    // Patching
    // =========================================================================

    /// Patch a u32 at a specific position (big-endian)
    pub fn patch_u32_be(&mut self, pos: usize, value: u32) -> Result<()> {
        if pos + 4 > self.data.len() {
            return Err(Error::BufferUnderflow {
                needed: 4,
                available: self.data.len().saturating_sub(pos),
            });
        }
        self.data[pos..pos + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for WriteBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
