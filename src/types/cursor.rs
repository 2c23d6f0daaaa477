//! REF CURSOR
//!
//! Only the server-side cursor id crosses this layer; the describe
//! information that follows it belongs to statement handling.

use super::{mismatch, TypeCoder, TypeDescriptor, Value};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::{Error, Result};

/// Coder for REF CURSOR ids
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorCoder;

impl CursorCoder {
    fn cursor_id(value: &Value, desc: &TypeDescriptor) -> Result<u32> {
        match value {
            Value::Integer(id) => u32::try_from(*id)
                .map_err(|_| Error::DataConversionError(format!("invalid cursor id {}", id))),
            other => Err(mismatch(other, desc.wire_type)),
        }
    }
}

impl TypeCoder for CursorCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        Ok(Self::cursor_id(value, desc)?.to_be_bytes().to_vec())
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        if data.len() > 4 {
            return Err(Error::DataConversionError(format!(
                "cursor id image too long ({} bytes)",
                data.len()
            )));
        }
        let id = data.iter().fold(0i64, |acc, &b| (acc << 8) | b as i64);
        Ok(Value::Integer(id))
    }

    fn read(&self, buf: &mut ReadBuffer, _desc: &TypeDescriptor) -> Result<Value> {
        match buf.read_ub4()? {
            0 => Ok(Value::Null),
            id => Ok(Value::Integer(id as i64)),
        }
    }

    fn write(&self, buf: &mut WriteBuffer, value: &Value, desc: &TypeDescriptor) -> Result<()> {
        match value {
            Value::Null => buf.write_ub4(0),
            other => buf.write_ub4(Self::cursor_id(other, desc)?),
        }
        Ok(())
    }
}
