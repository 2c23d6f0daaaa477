//! VECTOR encoding and decoding
//!
//! ```text
//! Offset | Size | Field
//! -------+------+-----------------------------------------
//!      0 |    1 | magic (219)
//!      1 |    1 | version (0)
//!      2 |    2 | flags (BE)
//!      4 |    1 | format: 2 = f32, 3 = f64, 4 = i8
//!      5 |  1-4 | element count (width chosen by flags)
//!      . |    8 | norm, present when flags & 0x10
//!      . |    n | elements
//! ```
//!
//! Float elements use the BINARY_FLOAT / BINARY_DOUBLE byte encoding.
//! Vectors are bound as a quasi LOB locator followed by the image.

use super::binary::{
    decode_binary_double, decode_binary_float, encode_binary_double, encode_binary_float,
};
use super::lob::{read_inline_image, write_inline_image};
use super::{mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{Error, Result};

const MAGIC: u8 = 219;
const VERSION: u8 = 0;
const FLAG_COUNT_U8: u16 = 0x0001;
const FLAG_COUNT_U32: u16 = 0x0002;
const FLAG_NORM: u16 = 0x0010;
const NORM_LENGTH: usize = 8;

/// Element format of a vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VectorFormat {
    /// 32-bit floats
    Float32 = 2,
    /// 64-bit floats
    Float64 = 3,
    /// 8-bit integers
    Int8 = 4,
}

/// VECTOR value
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    /// FLOAT32 elements
    Float32(Vec<f32>),
    /// FLOAT64 elements
    Float64(Vec<f64>),
    /// INT8 elements
    Int8(Vec<i8>),
}

impl Vector {
    /// Element format
    pub fn format(&self) -> VectorFormat {
        match self {
            Vector::Float32(_) => VectorFormat::Float32,
            Vector::Float64(_) => VectorFormat::Float64,
            Vector::Int8(_) => VectorFormat::Int8,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Vector::Float32(v) => v.len(),
            Vector::Float64(v) => v.len(),
            Vector::Int8(v) => v.len(),
        }
    }

    /// Whether there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the vector image
    pub fn encode(&self) -> Vec<u8> {
        let mut out = WriteBuffer::new();
        out.write_u8(MAGIC);
        out.write_u8(VERSION);
        out.write_u16_be(FLAG_COUNT_U32 | FLAG_NORM);
        out.write_u8(self.format() as u8);
        out.write_u32_be(self.len() as u32);
        out.write_zeros(NORM_LENGTH);
        match self {
            Vector::Float32(v) => v.iter().for_each(|x| out.write_bytes(&encode_binary_float(*x))),
            Vector::Float64(v) => v.iter().for_each(|x| out.write_bytes(&encode_binary_double(*x))),
            Vector::Int8(v) => v.iter().for_each(|x| out.write_u8(*x as u8)),
        }
        out.as_slice().to_vec()
    }

    /// Parse a vector image
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = ReadBuffer::from_slice(data);
        let magic = buf.read_u8()?;
        if magic != MAGIC {
            return Err(Error::DataConversionError(format!(
                "unexpected vector magic {}",
                magic
            )));
        }
        let version = buf.read_u8()?;
        if version != VERSION {
            return Err(Error::DataConversionError(format!(
                "vector version {} not supported",
                version
            )));
        }
        let flags = buf.read_u16_be()?;
        let format = buf.read_u8()?;
        let count = if flags & FLAG_COUNT_U8 != 0 {
            buf.read_u8()? as usize
        } else if flags & FLAG_COUNT_U32 != 0 {
            buf.read_u32_be()? as usize
        } else {
            buf.read_u16_be()? as usize
        };
        if flags & FLAG_NORM != 0 {
            buf.skip(NORM_LENGTH)?;
        }
        let vector = match format {
            2 => Vector::Float32(
                (0..count)
                    .map(|_| decode_binary_float(&buf.read_bytes_vec(4)?))
                    .collect::<Result<_>>()?,
            ),
            3 => Vector::Float64(
                (0..count)
                    .map(|_| decode_binary_double(&buf.read_bytes_vec(8)?))
                    .collect::<Result<_>>()?,
            ),
            4 => Vector::Int8(buf.read_bytes_vec(count)?.into_iter().map(|b| b as i8).collect()),
            other => {
                return Err(Error::DataConversionError(format!(
                    "unsupported vector format {}",
                    other
                )))
            }
        };
        Ok(vector)
    }
}

/// Coder for VECTOR
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorCoder;

impl TypeCoder for VectorCoder {
    fn encode(&self, value: &Value, _desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::Vector(v) => Ok(v.encode()),
            other => Err(mismatch(other, WireType::Vector)),
        }
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        Vector::decode(data).map(Value::Vector)
    }

    fn read(&self, buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Value> {
        match read_inline_image(buf)? {
            Some(image) => self.decode(&image, desc),
            None => Ok(Value::Null),
        }
    }

    fn write(&self, buf: &mut WriteBuffer, value: &Value, desc: &TypeDescriptor) -> Result<()> {
        if value.is_null() {
            buf.write_u8(0);
            return Ok(());
        }
        write_inline_image(buf, &self.encode(value, desc)?);
        Ok(())
    }
}
