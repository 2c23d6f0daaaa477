//! BINARY_FLOAT, BINARY_DOUBLE, RAW and BOOLEAN
//!
//! Oracle stores binary floating point numbers in IEEE 754 format with the sign bit
//! manipulated to allow proper sorting:
//!
//! Encoding:
//! - If the sign bit is 0 (positive), set it to 1
//! - If the sign bit is 1 (negative), invert all bytes
//!
//! Decoding:
//! - If the sign bit is 1, clear it (set to 0)
//! - If the sign bit is 0, invert all bytes
//!
//! The data is stored in big-endian format.

use super::{mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::error::{Error, Result};

fn sortable<const N: usize>(mut bytes: [u8; N]) -> [u8; N] {
    if bytes[0] & 0x80 == 0 {
        bytes[0] |= 0x80;
    } else {
        bytes.iter_mut().for_each(|b| *b = !*b);
    }
    bytes
}

fn unsortable<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    let mut bytes: [u8; N] = data
        .get(..N)
        .and_then(|d| d.try_into().ok())
        .ok_or_else(|| {
            Error::DataConversionError(format!(
                "binary float image needs {} bytes, got {}",
                N,
                data.len()
            ))
        })?;
    if bytes[0] & 0x80 != 0 {
        bytes[0] &= 0x7F;
    } else {
        bytes.iter_mut().for_each(|b| *b = !*b);
    }
    Ok(bytes)
}

/// Encode an f32 to Oracle BINARY_FLOAT wire format (4 bytes)
pub fn encode_binary_float(value: f32) -> [u8; 4] {
    sortable(value.to_be_bytes())
}

/// Decode an Oracle BINARY_FLOAT from wire format (4 bytes)
pub fn decode_binary_float(data: &[u8]) -> Result<f32> {
    unsortable::<4>(data).map(f32::from_be_bytes)
}

/// Encode an f64 to Oracle BINARY_DOUBLE wire format (8 bytes)
pub fn encode_binary_double(value: f64) -> [u8; 8] {
    sortable(value.to_be_bytes())
}

/// Decode an Oracle BINARY_DOUBLE from wire format (8 bytes)
pub fn decode_binary_double(data: &[u8]) -> Result<f64> {
    unsortable::<8>(data).map(f64::from_be_bytes)
}

/// Coder for BINARY_FLOAT and BINARY_DOUBLE
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCoder;

impl TypeCoder for FloatCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        let v = match value {
            Value::Double(d) => *d,
            Value::Float(f) => *f as f64,
            Value::Integer(i) => *i as f64,
            Value::Number(s) | Value::Text(s) => s.trim().parse().map_err(|_| {
                Error::DataConversionError(format!("{:?} is not a floating point number", s))
            })?,
            other => return Err(mismatch(other, desc.wire_type)),
        };
        Ok(if desc.wire_type == WireType::BinaryFloat {
            encode_binary_float(v as f32).to_vec()
        } else {
            encode_binary_double(v).to_vec()
        })
    }

    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value> {
        if desc.wire_type == WireType::BinaryFloat {
            decode_binary_float(data).map(Value::Float)
        } else {
            decode_binary_double(data).map(Value::Double)
        }
    }
}

/// Coder for RAW and LONG RAW
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCoder;

impl TypeCoder for RawCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::Raw(bytes) => Ok(bytes.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch(other, desc.wire_type)),
        }
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        Ok(Value::Raw(data.to_vec()))
    }
}

/// Coder for BOOLEAN
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCoder;

impl TypeCoder for BoolCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::Bool(b) => Ok(vec![1, *b as u8]),
            Value::Integer(i) => Ok(vec![1, (*i != 0) as u8]),
            other => Err(mismatch(other, desc.wire_type)),
        }
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        Ok(Value::Bool(data.last().map_or(false, |&b| b != 0)))
    }
}
