//! Oracle wire type codecs
//!
//! Every Oracle data type the core understands is listed in the closed
//! [`WireType`] enum. [`coder_for`] maps each one to a static
//! [`TypeCoder`] that converts between [`Value`] and the bytes carried in
//! TTC messages.
//!
//! ```text
//! WireType ──coder_for──► &'static dyn TypeCoder
//!                            encode / decode   (value image)
//!                            read / write      (value stream framing)
//! ```

mod binary;
mod cursor;
mod date;
mod interval;
mod lob;
mod number;
mod oson;
mod pickle;
mod rowid;
mod text;
mod value;
mod vector;

pub use binary::{
    decode_binary_double, decode_binary_float, encode_binary_double, encode_binary_float,
    BoolCoder, FloatCoder, RawCoder,
};
pub use cursor::CursorCoder;
pub use date::{decode_date, encode_date, DateCoder, TimestampTz};
pub use interval::{IntervalCoder, IntervalDs, IntervalYm};
pub use lob::{create_quasi_locator, LobCoder, LobLocator, QUASI_LOCATOR_LENGTH};
pub use number::{Number, NumberCoder};
pub use oson::{JsonCoder, OsonDecoder, OsonEncoder};
pub use pickle::{ObjectCoder, ObjectKind, ObjectSchema, ObjectValue};
pub use rowid::{decode_rowid, decode_urowid, RowId, RowIdCoder};
pub use text::TextCoder;
pub use value::{Direction, ParameterValue, Value};
pub use vector::{Vector, VectorCoder, VectorFormat};

use std::borrow::Cow;

use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::charset::StringConverter;
use crate::constants::csfrm;
use crate::error::{Error, Result};
use crate::registry::{self, RegistrySnapshot};

/// Oracle data types understood on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum WireType {
    Varchar = 1,
    Number = 2,
    Long = 8,
    RowId = 11,
    Date = 12,
    Raw = 23,
    LongRaw = 24,
    Char = 96,
    BinaryFloat = 100,
    BinaryDouble = 101,
    RefCursor = 102,
    URowId = 104,
    Object = 109,
    Clob = 112,
    Blob = 113,
    BFile = 114,
    Json = 119,
    Vector = 127,
    Timestamp = 180,
    TimestampTz = 181,
    IntervalYm = 182,
    IntervalDs = 183,
    TimestampLtz = 231,
    Boolean = 252,
}

impl WireType {
    /// Numeric type code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Character data travelling through a string converter
    pub fn is_character(self) -> bool {
        matches!(self, WireType::Varchar | WireType::Char | WireType::Long | WireType::Clob)
    }

    /// Out-of-line data addressed by a locator
    pub fn is_lob(self) -> bool {
        matches!(self, WireType::Clob | WireType::Blob | WireType::BFile)
    }
}

impl TryFrom<u16> for WireType {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        let wire_type = match code {
            1 => WireType::Varchar,
            2 => WireType::Number,
            8 => WireType::Long,
            11 => WireType::RowId,
            12 => WireType::Date,
            23 => WireType::Raw,
            24 => WireType::LongRaw,
            96 => WireType::Char,
            100 => WireType::BinaryFloat,
            101 => WireType::BinaryDouble,
            102 => WireType::RefCursor,
            104 => WireType::URowId,
            109 => WireType::Object,
            112 => WireType::Clob,
            113 => WireType::Blob,
            114 => WireType::BFile,
            119 => WireType::Json,
            127 => WireType::Vector,
            180 => WireType::Timestamp,
            181 => WireType::TimestampTz,
            182 => WireType::IntervalYm,
            183 => WireType::IntervalDs,
            231 => WireType::TimestampLtz,
            252 => WireType::Boolean,
            other => return Err(Error::UnknownType(other)),
        };
        Ok(wire_type)
    }
}

/// Default buffer size given to new descriptors
pub const DEFAULT_MAX_LENGTH: u32 = 4000;

/// Shape of a column or bind value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Wire type
    pub wire_type: WireType,
    /// NUMBER precision
    pub precision: u8,
    /// NUMBER scale
    pub scale: i8,
    /// Maximum length in bytes; zero for RAW means always NULL
    pub max_len: u32,
    /// Maximum length in characters; zero for CHAR data means always NULL
    pub max_char_len: u32,
    /// Charset id, zero for the registry default
    pub charset_id: u16,
    /// Charset form (1 implicit, 2 NCHAR)
    pub charset_form: u8,
    /// Value is an attribute of a user-defined type
    pub is_udt_param: bool,
    /// Registered schema for OBJECT values
    pub schema_name: Option<String>,
    /// Snapshot that schemas, the default charset and time zone regions are
    /// resolved against; `None` reads the live registry
    pub registry: Option<RegistrySnapshot>,
}

impl TypeDescriptor {
    /// Descriptor with default lengths and the implicit charset form
    pub fn new(wire_type: WireType) -> Self {
        Self {
            wire_type,
            precision: 0,
            scale: 0,
            max_len: DEFAULT_MAX_LENGTH,
            max_char_len: DEFAULT_MAX_LENGTH,
            charset_id: 0,
            charset_form: csfrm::IMPLICIT,
            is_udt_param: false,
            schema_name: None,
            registry: None,
        }
    }

    /// Descriptor for an OBJECT value of a registered schema
    pub fn object(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: Some(schema_name.into()),
            ..Self::new(WireType::Object)
        }
    }

    /// Switch to the national charset
    pub fn nchar(mut self) -> Self {
        self.charset_form = csfrm::NCHAR;
        self
    }

    /// Use a fixed charset instead of the registry default
    pub fn with_charset(mut self, charset_id: u16) -> Self {
        self.charset_id = charset_id;
        self
    }

    /// Resolve registry lookups against `snapshot`
    pub fn with_registry(mut self, snapshot: RegistrySnapshot) -> Self {
        self.registry = Some(snapshot);
        self
    }

    /// Registry this descriptor resolves against
    pub fn registry(&self) -> Cow<'_, RegistrySnapshot> {
        match &self.registry {
            Some(snapshot) => Cow::Borrowed(snapshot),
            None => Cow::Owned(registry::snapshot()),
        }
    }

    /// This descriptor bound to `snapshot` unless it carries its own
    pub(crate) fn inherit(&self, snapshot: Option<&RegistrySnapshot>) -> Cow<'_, TypeDescriptor> {
        match snapshot {
            Some(snapshot) if self.registry.is_none() => {
                Cow::Owned(self.clone().with_registry(snapshot.clone()))
            }
            _ => Cow::Borrowed(self),
        }
    }

    /// Converter for character data of this descriptor
    pub fn converter(&self) -> StringConverter {
        if self.charset_form == csfrm::NCHAR {
            StringConverter::nchar()
        } else if self.charset_id != 0 {
            StringConverter::for_charset(self.charset_id)
        } else {
            self.registry().default_converter()
        }
    }

    /// Columns declared with a zero length never carry data
    fn always_null(&self) -> bool {
        match self.wire_type {
            WireType::Char | WireType::Varchar => self.max_char_len == 0,
            WireType::Raw => self.max_len == 0,
            _ => false,
        }
    }
}

/// Value stream codec for one family of wire types
pub trait TypeCoder: Sync {
    /// Build the value image
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>>;

    /// Decode a non-empty value image
    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value>;

    /// Read a value from the stream
    ///
    /// The image is a Clr, or a fixed Clr for attributes of user-defined
    /// types. An empty image is NULL.
    fn read(&self, buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Value> {
        match read_image(buf, desc)? {
            Some(data) => self.decode(&data, desc),
            None => Ok(Value::Null),
        }
    }

    /// Write a value to the stream as a Clr
    fn write(&self, buf: &mut WriteBuffer, value: &Value, desc: &TypeDescriptor) -> Result<()> {
        if value.is_null() {
            buf.write_clr(&[]);
        } else {
            let data = self.encode(value, desc)?;
            buf.write_clr(&data);
        }
        Ok(())
    }
}

/// Read the raw image for `desc`, `None` when the value is NULL
pub(crate) fn read_image(buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Option<Vec<u8>>> {
    if desc.always_null() {
        return Ok(None);
    }
    let data = if desc.is_udt_param {
        buf.read_fixed_clr()?
    } else {
        buf.read_clr()?
    };
    Ok(if data.is_empty() { None } else { Some(data) })
}

/// Coder for a wire type
pub fn coder_for(wire_type: WireType) -> &'static dyn TypeCoder {
    match wire_type {
        WireType::Number => &NumberCoder,
        WireType::Varchar | WireType::Char | WireType::Long => &TextCoder,
        WireType::Raw | WireType::LongRaw => &RawCoder,
        WireType::BinaryFloat | WireType::BinaryDouble => &FloatCoder,
        WireType::Boolean => &BoolCoder,
        WireType::Date
        | WireType::Timestamp
        | WireType::TimestampTz
        | WireType::TimestampLtz => &DateCoder,
        WireType::RowId | WireType::URowId => &RowIdCoder,
        WireType::IntervalYm | WireType::IntervalDs => &IntervalCoder,
        WireType::Vector => &VectorCoder,
        WireType::Clob | WireType::Blob | WireType::BFile => &LobCoder,
        WireType::Object => &ObjectCoder,
        WireType::Json => &JsonCoder,
        WireType::RefCursor => &CursorCoder,
    }
}

/// Coder for a numeric type code
pub fn coder_for_code(code: u16) -> Result<&'static dyn TypeCoder> {
    WireType::try_from(code).map(coder_for)
}

/// Conversion failure for a value the coder cannot represent
pub(crate) fn mismatch(value: &Value, wire_type: WireType) -> Error {
    Error::DataConversionError(format!(
        "cannot encode {} as {:?}",
        value.kind(),
        wire_type
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [u16; 24] = [
        1, 2, 8, 11, 12, 23, 24, 96, 100, 101, 102, 104, 109, 112, 113, 114, 119, 127, 180, 181,
        182, 183, 231, 252,
    ];

    #[test]
    fn test_wire_type_codes() {
        for code in ALL {
            let wire_type = WireType::try_from(code).unwrap();
            assert_eq!(wire_type.code(), code);
            assert!(coder_for_code(code).is_ok());
        }
    }

    #[test]
    fn test_unknown_type() {
        assert!(matches!(WireType::try_from(3), Err(Error::UnknownType(3))));
        assert!(matches!(coder_for_code(999), Err(Error::UnknownType(999))));
    }

    #[test]
    fn test_default_read_null_and_fixed_clr() {
        let desc = TypeDescriptor::new(WireType::Raw);
        let mut buf = ReadBuffer::from_vec(vec![0]);
        assert_eq!(coder_for(WireType::Raw).read(&mut buf, &desc).unwrap(), Value::Null);

        let mut desc = TypeDescriptor::new(WireType::Raw);
        desc.is_udt_param = true;
        let mut data = vec![0xFE, 0, 0, 1, 0];
        data.extend(vec![7u8; 256]);
        let mut buf = ReadBuffer::from_vec(data);
        assert_eq!(
            coder_for(WireType::Raw).read(&mut buf, &desc).unwrap(),
            Value::Raw(vec![7u8; 256])
        );
    }

    #[test]
    fn test_zero_length_columns_are_null() {
        let mut desc = TypeDescriptor::new(WireType::Char);
        desc.max_char_len = 0;
        let mut buf = ReadBuffer::from_vec(vec![1, b'a']);
        assert_eq!(coder_for(WireType::Char).read(&mut buf, &desc).unwrap(), Value::Null);
        assert_eq!(buf.position(), 0);
    }

    #[test]
    fn test_write_null() {
        let desc = TypeDescriptor::new(WireType::Number);
        let mut buf = WriteBuffer::new();
        coder_for(WireType::Number).write(&mut buf, &Value::Null, &desc).unwrap();
        assert_eq!(buf.as_slice(), &[0]);
    }

    #[test]
    fn test_descriptor_converter() {
        let desc = TypeDescriptor::new(WireType::Varchar).nchar();
        assert_eq!(desc.converter(), StringConverter::Utf16Be);
        let desc = TypeDescriptor::new(WireType::Varchar).with_charset(31);
        assert_eq!(desc.converter(), StringConverter::Latin1);
    }

    #[test]
    fn test_inherit_keeps_own_registry() {
        let outer = registry::snapshot();
        let plain = TypeDescriptor::new(WireType::Number);
        assert!(plain.inherit(None).registry.is_none());
        assert_eq!(plain.inherit(Some(&outer)).registry.as_ref(), Some(&outer));

        let own = registry::snapshot();
        let bound = TypeDescriptor::new(WireType::Number).with_registry(own.clone());
        assert!(matches!(bound.inherit(Some(&outer)), Cow::Borrowed(_)));
        assert_eq!(bound.registry().into_owned(), own);
    }
}
