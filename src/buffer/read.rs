//! Read buffer for decoding TTC data
//!
//! The buffer is appendable: the session pushes each received data payload
//! onto the end and decoders consume from the current position. A decoder that
//! runs past the end gets [`Error::BufferUnderflow`]; the session then restores
//! the position it marked, receives another packet and retries.

use bytes::BytesMut;

use super::StreamOptions;
use crate::constants::length;
use crate::error::{Error, Result};

/// A buffer for reading TTC protocol data
#[derive(Debug, Default, Clone)]
pub struct ReadBuffer {
    /// Received bytes not yet compacted away
    data: BytesMut,
    /// Current read position
    pos: usize,
    options: StreamOptions,
}

impl ReadBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ReadBuffer from a byte slice
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            data: BytesMut::from(data),
            ..Self::default()
        }
    }

    /// Create a new ReadBuffer from a Vec
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self::from_slice(&data)
    }

    /// Replace the stream options
    pub fn set_options(&mut self, options: StreamOptions) {
        self.options = options;
    }

    /// Current stream options
    pub fn options(&self) -> StreamOptions {
        self.options
    }

    /// Append received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Drop everything before the current position
    pub fn compact(&mut self) {
        if self.pos > 0 {
            let _ = self.data.split_to(self.pos);
            self.pos = 0;
        }
    }

    /// Discard all data
    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    /// Get the current position in the buffer
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to be read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Get a slice of the remaining bytes (without advancing position)
    #[inline]
    pub fn remaining_bytes(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Check if there are at least `n` bytes remaining
    #[inline]
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Set the buffer position
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::BufferUnderflow {
                needed: pos,
                available: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `n` bytes in the buffer
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure_remaining(n)?;
        self.pos += n;
        Ok(())
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    #[inline]
    fn ensure_remaining(&self, n: usize) -> Result<()> {
        if self.remaining() < n {
            Err(Error::BufferUnderflow {
                needed: n,
                available: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        self.ensure_remaining(n)?;
        let start = self.pos;
        self.pos += n;
        Ok(&self.data[start..start + n])
    }

    // =========================================================================
    // Raw byte reads
    // =========================================================================

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read raw bytes and return as a Vec
    pub fn read_bytes_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        Ok(self.take(n)?.to_vec())
    }

    /// Read `n` bytes as a lossy UTF-8 string
    pub fn read_string(&mut self, n: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.take(n)?).into_owned())
    }

    /// Peek at the next byte without consuming it
    pub fn peek_u8(&self) -> Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.data[self.pos])
    }

    // =========================================================================
    // Fixed-width integer reads
    // =========================================================================

    /// Read a 16-bit unsigned integer in big-endian format
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(self.read_int(2, false, true)? as u16)
    }

    /// Read a 16-bit unsigned integer in little-endian format
    pub fn read_u16_le(&mut self) -> Result<u16> {
        Ok(self.read_int(2, false, false)? as u16)
    }

    /// Read a 32-bit unsigned integer in big-endian format
    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(self.read_int(4, false, true)? as u32)
    }

    /// Read a 64-bit unsigned integer in big-endian format
    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.read_uint(8, false, true)
    }

    // =========================================================================
    // TTC integer reads
    // =========================================================================

    /// Read an integer in either compressed or fixed form
    ///
    /// Compressed: the first byte holds the byte count in its low 7 bits and a
    /// negative flag in its top bit; the value follows big-endian. A count of 0
    /// is the value 0. Fixed: exactly `size` bytes in the given endianness.
    pub fn read_int(&mut self, size: usize, compress: bool, big_endian: bool) -> Result<i64> {
        let mut negative = false;
        let mut size = size;
        let mut big_endian = big_endian;
        if compress {
            let len = self.read_u8()?;
            negative = len & 0x80 != 0;
            size = (len & 0x7F) as usize;
            big_endian = true;
        }
        if size == 0 {
            return Ok(0);
        }
        if size > 8 {
            return Err(Error::InvalidLengthIndicator(size as u8));
        }
        let bytes = self.take(size)?;
        let mut temp = [0u8; 8];
        let value = if big_endian {
            temp[8 - size..].copy_from_slice(bytes);
            u64::from_be_bytes(temp)
        } else {
            temp[..size].copy_from_slice(bytes);
            u64::from_le_bytes(temp)
        };
        let value = value as i64;
        Ok(if negative { value.wrapping_neg() } else { value })
    }

    /// Unsigned variant of [`read_int`](Self::read_int)
    pub fn read_uint(&mut self, size: usize, compress: bool, big_endian: bool) -> Result<u64> {
        Ok(self.read_int(size, compress, big_endian)? as u64)
    }

    /// Read a TTC UB1
    #[inline]
    pub fn read_ub1(&mut self) -> Result<u8> {
        self.read_u8()
    }

    /// Read a compressed 2-byte integer
    pub fn read_ub2(&mut self) -> Result<u16> {
        Ok(self.read_int(2, true, true)? as u16)
    }

    /// Read a compressed 4-byte integer
    pub fn read_ub4(&mut self) -> Result<u32> {
        Ok(self.read_int(4, true, true)? as u32)
    }

    /// Read a compressed signed 4-byte integer
    pub fn read_sb4(&mut self) -> Result<i32> {
        Ok(self.read_int(4, true, true)? as i32)
    }

    /// Read a compressed 8-byte integer
    pub fn read_ub8(&mut self) -> Result<u64> {
        self.read_uint(8, true, true)
    }

    // =========================================================================
    // Byte strings
    // =========================================================================

    /// Read a Clr byte string
    ///
    /// `0`, `0xFD` and `0xFF` are nil and come back empty. `0xFE` starts a
    /// chunked value terminated by a zero-length chunk.
    pub fn read_clr(&mut self) -> Result<Vec<u8>> {
        let first = self.read_u8()?;
        match first {
            0 | length::ESCAPE_CHAR | length::NULL_INDICATOR => Ok(Vec::new()),
            length::LONG_INDICATOR => {
                let mut result = Vec::new();
                loop {
                    let chunk_len = if self.options.use_big_clr_chunks {
                        self.read_ub4()? as usize
                    } else {
                        self.read_u8()? as usize
                    };
                    if chunk_len == 0 {
                        break;
                    }
                    result.extend_from_slice(self.take(chunk_len)?);
                }
                Ok(result)
            }
            n => self.read_bytes_vec(n as usize),
        }
    }

    /// Read a Clr that distinguishes NULL from empty
    pub fn read_clr_opt(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek_u8()? {
            0 | length::NULL_INDICATOR => {
                self.skip(1)?;
                Ok(None)
            }
            _ => self.read_clr().map(Some),
        }
    }

    /// Read a fixed Clr: inline length or `0xFE` plus a 4-byte big-endian length
    pub fn read_fixed_clr(&mut self) -> Result<Vec<u8>> {
        let first = self.read_u8()?;
        let len = match first {
            length::LONG_INDICATOR => self.read_u32_be()? as usize,
            length::NULL_INDICATOR => 0,
            n => n as usize,
        };
        self.read_bytes_vec(len)
    }

    /// Read a Dlc: compressed length then a Clr truncated to that length
    pub fn read_dlc(&mut self) -> Result<Vec<u8>> {
        let len = self.read_ub4()? as usize;
        if len == 0 {
            return Ok(Vec::new());
        }
        let mut out = self.read_clr()?;
        out.truncate(len);
        Ok(out)
    }

    /// Read a key/value/flag triple
    pub fn read_key_val(&mut self) -> Result<(Vec<u8>, Vec<u8>, u32)> {
        let key = self.read_dlc()?;
        let val = self.read_dlc()?;
        let flag = self.read_ub4()?;
        Ok((key, val, flag))
    }

    /// Read a NUL-terminated string of at most `max` bytes
    ///
    /// When no terminator shows up within `max` bytes the full `max` bytes are
    /// returned.
    pub fn read_null_term_string(&mut self, max: usize) -> Result<String> {
        let window = &self.data[self.pos..];
        let limit = window.len().min(max);
        if let Some(idx) = window[..limit].iter().position(|&b| b == 0) {
            let s = String::from_utf8_lossy(&window[..idx]).into_owned();
            self.pos += idx + 1;
            return Ok(s);
        }
        self.read_string(max)
    }
}

impl From<Vec<u8>> for ReadBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for ReadBuffer {
    fn from(data: &[u8]) -> Self {
        Self::from_slice(data)
    }
}
