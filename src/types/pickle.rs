//! Oracle object pickle format encoding and decoding
//!
//! This module handles the "pickle" binary format used for Oracle database objects
//! and collections (VARRAY, Nested Tables, Associative Arrays) in the TNS protocol.
//!
//! # Pickle Format Overview
//!
//! ```text
//! Header:
//!   flags (1 byte): 0x84 for objects, 0x88 for collections
//!   version (1 byte): IMAGE_VERSION (1)
//!   length (1 or 5 bytes): total image length, header included;
//!                          0xFE + u32 BE once it exceeds 245
//!   [prefix segment]: collections only, [01] [01]
//!
//! Collection Data:
//!   collection type (1 byte): 1 index-by, 2 nested table, 3 varray
//!   num_elements (length-encoded)
//!   elements[]:
//!     For index-by tables: index (4 bytes BE) + value
//!     Otherwise: value
//!
//! Object Data:
//!   attributes in schema order
//!
//! Values are length-prefixed images produced by each attribute's own
//! coder. NULL is ATOMIC_NULL (253) for object attributes and
//! NULL_LENGTH_INDICATOR (255) for collection elements.
//! ```
//!
//! Attribute layouts are not discovered from the server: every type is
//! described by an [`ObjectSchema`] registered with the registry. Nested
//! attributes resolve against the same registry snapshot as the outer value.

use std::sync::Arc;

use super::{coder_for, mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::constants::{collection_type, obj_flags};
use crate::error::{Error, Result};
use crate::registry::RegistrySnapshot;

/// Long length indicator (value > 245)
const LONG_LENGTH_INDICATOR: u8 = 254;

/// Layout of a user-defined type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    /// Object type with ordered attributes
    Object {
        /// Attribute names and descriptors, in declaration order
        attributes: Vec<(String, TypeDescriptor)>,
    },
    /// Collection type
    Collection {
        /// One of the `collection_type` codes
        collection_type: u8,
        /// Element descriptor
        element: Box<TypeDescriptor>,
    },
}

/// Registered description of a user-defined type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSchema {
    /// Fully qualified type name
    pub name: String,
    /// Layout
    pub kind: ObjectKind,
}

impl ObjectSchema {
    /// Object type
    pub fn object<N: Into<String>>(
        name: impl Into<String>,
        attributes: impl IntoIterator<Item = (N, TypeDescriptor)>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Object {
                attributes: attributes.into_iter().map(|(n, d)| (n.into(), d)).collect(),
            },
        }
    }

    /// Collection type
    pub fn collection(name: impl Into<String>, collection_type: u8, element: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: ObjectKind::Collection {
                collection_type,
                element: Box::new(element),
            },
        }
    }

    /// Whether this describes a collection
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, ObjectKind::Collection { .. })
    }

    /// Build the pickle image of `value`
    ///
    /// Nested object types are looked up in the live registry.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        self.encode_in(value, None)
    }

    /// Parse a pickle image
    ///
    /// Nested object types are looked up in the live registry.
    pub fn decode(&self, data: &[u8]) -> Result<Value> {
        self.decode_in(data, None)
    }

    fn encode_in(&self, value: &Value, registry: Option<&RegistrySnapshot>) -> Result<Vec<u8>> {
        let mut body = WriteBuffer::new();
        let flags = match (&self.kind, value) {
            (ObjectKind::Object { attributes }, Value::Object(obj)) => {
                for (name, desc) in attributes {
                    let attr = obj.get(name).unwrap_or(&Value::Null);
                    let desc = desc.inherit(registry);
                    write_element(&mut body, attr, &desc, obj_flags::ATOMIC_NULL)?;
                }
                obj_flags::IS_VERSION_81 | obj_flags::NO_PREFIX_SEG
            }
            (
                ObjectKind::Collection {
                    collection_type,
                    element,
                },
                Value::Collection(items),
            ) => {
                // prefix segment
                body.write_u8(1);
                body.write_u8(1);
                body.write_u8(*collection_type);
                write_length(&mut body, items.len());
                let element = element.inherit(registry);
                for (index, item) in items.iter().enumerate() {
                    if *collection_type == collection_type::INDEX_BY {
                        body.write_u32_be(index as u32);
                    }
                    write_element(&mut body, item, &element, obj_flags::NULL)?;
                }
                obj_flags::IS_VERSION_81 | obj_flags::IS_COLLECTION
            }
            (_, other) => {
                return Err(Error::DataConversionError(format!(
                    "{} value does not match type {}",
                    other.kind(),
                    self.name
                )))
            }
        };

        let body = body.as_slice();
        let mut out = WriteBuffer::new();
        out.write_u8(flags);
        out.write_u8(obj_flags::IMAGE_VERSION);
        let short_total = body.len() + 3;
        if short_total <= obj_flags::MAX_SHORT_LENGTH as usize {
            out.write_u8(short_total as u8);
        } else {
            out.write_u8(LONG_LENGTH_INDICATOR);
            out.write_u32_be((body.len() + 7) as u32);
        }
        out.write_bytes(body);
        Ok(out.as_slice().to_vec())
    }

    fn decode_in(&self, data: &[u8], registry: Option<&RegistrySnapshot>) -> Result<Value> {
        let mut buf = ReadBuffer::from_slice(data);
        let flags = buf.read_u8()?;
        let _version = buf.read_u8()?;
        read_length(&mut buf)?;
        if flags & obj_flags::IS_DEGENERATE != 0 {
            return Err(Error::DataConversionError(format!(
                "{} is stored in a LOB, which is not supported",
                self.name
            )));
        }
        if flags & obj_flags::NO_PREFIX_SEG == 0 {
            let prefix = read_length(&mut buf)?;
            buf.skip(prefix)?;
        }

        match &self.kind {
            ObjectKind::Object { attributes } => {
                let mut obj = ObjectValue::new(&self.name);
                for (name, desc) in attributes {
                    let desc = desc.inherit(registry);
                    obj.attributes.push((name.clone(), read_element(&mut buf, &desc)?));
                }
                Ok(Value::Object(obj))
            }
            ObjectKind::Collection { element, .. } => {
                let wire_collection_type = buf.read_u8()?;
                let count = read_length(&mut buf)?;
                let element = element.inherit(registry);
                let mut items = Vec::with_capacity(count.min(buf.remaining()));
                for _ in 0..count {
                    if wire_collection_type == collection_type::INDEX_BY {
                        let _index = buf.read_u32_be()?;
                    }
                    items.push(read_element(&mut buf, &element)?);
                }
                Ok(Value::Collection(items))
            }
        }
    }
}

/// Instance of an object type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectValue {
    /// Type name matching a registered schema
    pub type_name: String,
    /// Attribute values by name
    pub attributes: Vec<(String, Value)>,
}

impl ObjectValue {
    /// Object with no attributes set
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Attribute value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Write a length value
fn write_length(buf: &mut WriteBuffer, len: usize) {
    if len <= obj_flags::MAX_SHORT_LENGTH as usize {
        buf.write_u8(len as u8);
    } else {
        buf.write_u8(LONG_LENGTH_INDICATOR);
        buf.write_u32_be(len as u32);
    }
}

/// Read a length value (1 byte if <= 245, otherwise 254 + 4-byte BE)
fn read_length(buf: &mut ReadBuffer) -> Result<usize> {
    match buf.read_u8()? {
        LONG_LENGTH_INDICATOR => Ok(buf.read_u32_be()? as usize),
        n => Ok(n as usize),
    }
}

fn write_element(
    buf: &mut WriteBuffer,
    value: &Value,
    desc: &TypeDescriptor,
    null_marker: u8,
) -> Result<()> {
    if value.is_null() {
        buf.write_u8(null_marker);
        return Ok(());
    }
    let image = coder_for(desc.wire_type).encode(value, desc)?;
    write_length(buf, image.len());
    buf.write_bytes(&image);
    Ok(())
}

fn read_element(buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Value> {
    let len = match buf.read_u8()? {
        obj_flags::ATOMIC_NULL | obj_flags::NULL => return Ok(Value::Null),
        LONG_LENGTH_INDICATOR => buf.read_u32_be()? as usize,
        n => n as usize,
    };
    if len == 0 {
        return Ok(Value::Null);
    }
    let image = buf.read_bytes_vec(len)?;
    coder_for(desc.wire_type).decode(&image, desc)
}

fn schema_for(desc: &TypeDescriptor) -> Result<Arc<ObjectSchema>> {
    let name = desc.schema_name.as_deref().ok_or_else(|| {
        Error::DataConversionError("OBJECT descriptor without a schema name".to_string())
    })?;
    desc.registry().schema(name)
}

/// Coder for OBJECT values, objects and collections alike
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectCoder;

impl TypeCoder for ObjectCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::Object(_) | Value::Collection(_) => {
                schema_for(desc)?.encode_in(value, desc.registry.as_ref())
            }
            other => Err(mismatch(other, WireType::Object)),
        }
    }

    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value> {
        schema_for(desc)?.decode_in(data, desc.registry.as_ref())
    }
}
