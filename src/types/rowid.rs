//! Oracle ROWID and UROWID decoding
//!
//! Oracle ROWID is a unique identifier for a row in a table.
//!
//! Physical ROWID format (10 bytes on wire, 18 characters encoded):
//! - RBA (Relative Block Address): 4 bytes (u32 big-endian)
//! - Partition ID: 2 bytes (u16 big-endian)
//! - Block Number: 4 bytes (u32 big-endian)
//! - Slot Number: 2 bytes (u16 big-endian)
//!
//! The encoded string uses base64-like alphabet:
//! - 6 characters for RBA
//! - 3 characters for Partition ID
//! - 6 characters for Block Number
//! - 3 characters for Slot Number
//!
//! A UROWID image starting with 1 holds a physical ROWID. Anything else is
//! a logical ROWID (index-organized tables), shown as `*` followed by the
//! base64 form of the image.

use std::fmt;

use super::{mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::buffer::ReadBuffer;
use crate::error::{Error, Result};

/// Base64 alphabet used for ROWID encoding
const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Characters standing for the first byte of a logical ROWID
const LOGICAL_INDICATOR: &[u8] = b"A*-()";

/// Image length of a physical UROWID
const PHYSICAL_LENGTH: usize = 13;

/// Decoded physical ROWID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowId {
    /// Relative Block Address (data object number)
    pub rba: u32,
    /// Partition ID (relative file number)
    pub partition_id: u16,
    /// Block number within the data file
    pub block_num: u32,
    /// Slot number (row number within the block)
    pub slot_num: u16,
}

impl RowId {
    /// Whether every component is zero
    pub fn is_empty(&self) -> bool {
        self.rba == 0 && self.partition_id == 0 && self.block_num == 0 && self.slot_num == 0
    }

    /// Parse the 12-byte big-endian layout
    fn from_image(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(Error::DataConversionError(format!(
                "ROWID image too short ({} bytes)",
                data.len()
            )));
        }
        Ok(Self {
            rba: u32::from_be_bytes([data[0], data[1], data[2], data[3]]),
            partition_id: u16::from_be_bytes([data[4], data[5]]),
            block_num: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
            slot_num: u16::from_be_bytes([data[10], data[11]]),
        })
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(18);
        push_base64(&mut out, self.rba as u64, 6);
        push_base64(&mut out, self.partition_id as u64, 3);
        push_base64(&mut out, self.block_num as u64, 6);
        push_base64(&mut out, self.slot_num as u64, 3);
        f.write_str(&out)
    }
}

/// Append `size` base64 digits of `value`, most significant first
fn push_base64(out: &mut String, value: u64, size: usize) {
    for i in (0..size).rev() {
        let index = ((value >> (6 * i)) & 0x3F) as usize;
        out.push(BASE64_ALPHABET[index] as char);
    }
}

/// Read the physical ROWID of a row header
///
/// The layout is a length byte, then compressed rba, partition, one
/// unused byte, block and slot. `None` for a zero length or an all-zero ROWID.
pub fn decode_rowid(buf: &mut ReadBuffer) -> Result<Option<RowId>> {
    if buf.read_u8()? == 0 {
        return Ok(None);
    }
    let rba = buf.read_uint(4, true, true)? as u32;
    let partition_id = buf.read_uint(2, true, true)? as u16;
    let filler = buf.read_u8()?;
    let block_num = buf.read_uint(4, true, true)? as u32;
    let slot_num = buf.read_uint(2, true, true)? as u16;
    let rowid = RowId {
        rba,
        partition_id,
        block_num,
        slot_num,
    };
    if rowid.is_empty() && filler == 0 {
        return Ok(None);
    }
    Ok(Some(rowid))
}

/// Text form of a UROWID image
pub fn decode_urowid(data: &[u8]) -> Result<String> {
    match data.first() {
        None => Err(Error::DataConversionError("empty UROWID image".to_string())),
        Some(1) => {
            let image = data.get(1..PHYSICAL_LENGTH).ok_or_else(|| {
                Error::DataConversionError(format!("UROWID image too short ({} bytes)", data.len()))
            })?;
            let rowid = RowId::from_image(image)?;
            if rowid.rba == 0 {
                // restricted format
                Ok(format!(
                    "{:08X}.{:04X}.{:04X}",
                    rowid.block_num, rowid.slot_num, rowid.partition_id
                ))
            } else {
                Ok(rowid.to_string())
            }
        }
        Some(&first) => {
            let indicator = first
                .checked_sub(1)
                .and_then(|i| LOGICAL_INDICATOR.get(i as usize))
                .ok_or_else(|| {
                    Error::DataConversionError(format!("invalid logical ROWID indicator {}", first))
                })?;
            let mut out = String::with_capacity(2 + data.len() * 4 / 3 + 2);
            out.push('*');
            out.push(*indicator as char);
            for chunk in data[1..].chunks(3) {
                let b0 = chunk[0] as usize;
                let b1 = chunk.get(1).copied().unwrap_or(0) as usize;
                let b2 = chunk.get(2).copied().unwrap_or(0) as usize;
                out.push(BASE64_ALPHABET[b0 >> 2] as char);
                out.push(BASE64_ALPHABET[((b0 & 0x03) << 4) | (b1 >> 4)] as char);
                if chunk.len() > 1 {
                    out.push(BASE64_ALPHABET[((b1 & 0x0F) << 2) | (b2 >> 6)] as char);
                }
                if chunk.len() > 2 {
                    out.push(BASE64_ALPHABET[b2 & 0x3F] as char);
                }
            }
            Ok(out)
        }
    }
}

/// Coder for ROWID and UROWID
#[derive(Debug, Clone, Copy, Default)]
pub struct RowIdCoder;

impl TypeCoder for RowIdCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::RowId(s) | Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch(other, desc.wire_type)),
        }
    }

    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value> {
        let text = match desc.wire_type {
            WireType::URowId => decode_urowid(data)?,
            _ if data.first() == Some(&1) && data.len() >= PHYSICAL_LENGTH => decode_urowid(data)?,
            _ if data.len() == 12 => RowId::from_image(data)?.to_string(),
            _ => String::from_utf8_lossy(data).into_owned(),
        };
        Ok(Value::RowId(text))
    }

    fn read(&self, buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Value> {
        if desc.wire_type == WireType::URowId {
            if buf.read_ub4()? == 0 {
                return Ok(Value::Null);
            }
            let data = buf.read_clr()?;
            if data.is_empty() {
                return Ok(Value::Null);
            }
            return self.decode(&data, desc);
        }
        Ok(decode_rowid(buf)?.map_or(Value::Null, |r| Value::RowId(r.to_string())))
    }
}
