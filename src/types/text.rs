//! VARCHAR, CHAR and LONG
//!
//! Character data is converted with the descriptor's charset: AL16UTF16 for
//! the national charset form, otherwise the column charset or the registry
//! default. Oracle treats the empty string as NULL, so an empty string
//! produces an empty image.

use super::{mismatch, TypeCoder, TypeDescriptor, Value};
use crate::error::Result;

/// Coder for character data
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCoder;

impl TypeCoder for TextCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        let text = match value {
            Value::Text(s) | Value::Number(s) | Value::RowId(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Json(json) => json.to_string(),
            other => return Err(mismatch(other, desc.wire_type)),
        };
        Ok(desc.converter().encode(&text))
    }

    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value> {
        Ok(Value::Text(desc.converter().decode(data)))
    }
}
