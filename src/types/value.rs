//! Values exchanged with the type coders

use chrono::NaiveDateTime;

use super::{
    coder_for, IntervalDs, IntervalYm, LobLocator, ObjectValue, TimestampTz, TypeDescriptor,
    Vector,
};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::Result;

/// A value in its Rust form
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Oracle NUMBER as a canonical decimal string
    Number(String),
    /// Integer bound to a NUMBER column
    Integer(i64),
    /// BINARY_FLOAT
    Float(f32),
    /// BINARY_DOUBLE
    Double(f64),
    /// Character data
    Text(String),
    /// RAW data
    Raw(Vec<u8>),
    /// BOOLEAN
    Bool(bool),
    /// DATE
    Date(NaiveDateTime),
    /// TIMESTAMP and TIMESTAMP WITH LOCAL TIME ZONE
    Timestamp(NaiveDateTime),
    /// TIMESTAMP WITH TIME ZONE
    TimestampTz(TimestampTz),
    /// ROWID or UROWID in text form
    RowId(String),
    /// Locator of an out-of-line LOB
    Lob(LobLocator),
    /// VECTOR
    Vector(Vector),
    /// JSON
    Json(serde_json::Value),
    /// Instance of a user-defined object type
    Object(ObjectValue),
    /// Elements of a user-defined collection type
    Collection(Vec<Value>),
    /// INTERVAL YEAR TO MONTH
    IntervalYm(IntervalYm),
    /// INTERVAL DAY TO SECOND
    IntervalDs(IntervalDs),
}

impl Value {
    /// Whether this is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Variant name, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Number(_) => "Number",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::Text(_) => "Text",
            Value::Raw(_) => "Raw",
            Value::Bool(_) => "Bool",
            Value::Date(_) => "Date",
            Value::Timestamp(_) => "Timestamp",
            Value::TimestampTz(_) => "TimestampTz",
            Value::RowId(_) => "RowId",
            Value::Lob(_) => "Lob",
            Value::Vector(_) => "Vector",
            Value::Json(_) => "Json",
            Value::Object(_) => "Object",
            Value::Collection(_) => "Collection",
            Value::IntervalYm(_) => "IntervalYm",
            Value::IntervalDs(_) => "IntervalDs",
        }
    }

    /// Text content, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Number(s) | Value::RowId(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Raw(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Bind direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Sent to the server only
    #[default]
    In,
    /// Returned by the server only
    Out,
    /// Sent and returned
    InOut,
}

/// A bind value with its descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValue {
    /// Bind direction
    pub direction: Direction,
    /// Wire shape
    pub descriptor: TypeDescriptor,
    /// Current value
    pub value: Value,
}

impl ParameterValue {
    /// Input parameter
    pub fn input(descriptor: TypeDescriptor, value: impl Into<Value>) -> Self {
        Self {
            direction: Direction::In,
            descriptor,
            value: value.into(),
        }
    }

    /// Output parameter, NULL until read
    pub fn output(descriptor: TypeDescriptor) -> Self {
        Self {
            direction: Direction::Out,
            descriptor,
            value: Value::Null,
        }
    }

    /// Write the value; output-only parameters go out as NULL
    pub fn write(&self, buf: &mut WriteBuffer) -> Result<()> {
        let coder = coder_for(self.descriptor.wire_type);
        match self.direction {
            Direction::Out => coder.write(buf, &Value::Null, &self.descriptor),
            Direction::In | Direction::InOut => coder.write(buf, &self.value, &self.descriptor),
        }
    }

    /// Replace the value with the one returned by the server
    pub fn read(&mut self, buf: &mut ReadBuffer) -> Result<&Value> {
        self.value = coder_for(self.descriptor.wire_type).read(buf, &self.descriptor)?;
        Ok(&self.value)
    }
}
