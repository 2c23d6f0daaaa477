//! LOB locators
//!
//! A CLOB, BLOB or BFILE value travels as a locator: an opaque byte string
//! the server hands out and later accepts in LOB operations. A handful of
//! bits in the locator header describe how its data is stored.

use super::{mismatch, read_image, TypeCoder, TypeDescriptor, Value};
use crate::buffer::{ReadBuffer, WriteBuffer};
use crate::error::Result;

/// Length of a quasi locator
pub const QUASI_LOCATOR_LENGTH: usize = 40;

/// LOB locator - holds the reference to a LOB stored in the database
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LobLocator(Vec<u8>);

impl LobLocator {
    /// Wrap locator bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        LobLocator(bytes)
    }

    /// Raw locator bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length of the locator
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No locator bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn bit(&self, index: usize, mask: u8) -> bool {
        self.0.get(index).map_or(false, |b| b & mask != 0)
    }

    /// Set bits in one header byte, if the locator is long enough
    pub(crate) fn set_bits(&mut self, index: usize, mask: u8) {
        if let Some(b) = self.0.get_mut(index) {
            *b |= mask;
        }
    }

    /// CLOB data is stored in a variable-width charset (AL16UTF16)
    pub fn is_variable_width(&self) -> bool {
        self.bit(6, 0x80)
    }

    /// Variable-width data is little-endian
    pub fn is_little_endian(&self) -> bool {
        self.bit(7, 0x40)
    }

    /// Value-based locator
    pub fn is_value_based(&self) -> bool {
        self.bit(4, 0x20)
    }

    /// Temporary LOB, freed with the session
    pub fn is_temporary(&self) -> bool {
        self.bit(7, 0x01) || self.bit(4, 0x40) || self.is_value_based()
    }

    /// Quasi locator carrying its data inline
    pub fn is_quasi(&self) -> bool {
        self.0.get(3) == Some(&4)
    }

    /// Read-only LOB
    pub fn is_read_only(&self) -> bool {
        self.bit(6, 0x01)
    }

    /// Temporary LOB already opened
    pub fn is_open(&self) -> bool {
        self.bit(7, 0x08)
    }
}

impl From<Vec<u8>> for LobLocator {
    fn from(bytes: Vec<u8>) -> Self {
        LobLocator(bytes)
    }
}

/// Quasi locator announcing `data_len` bytes of inline data
pub fn create_quasi_locator(data_len: u64) -> LobLocator {
    let mut bytes = vec![0u8; QUASI_LOCATOR_LENGTH];
    bytes[1] = 38;
    bytes[3] = 4;
    bytes[4] = 97;
    bytes[5] = 8;
    bytes[9] = 1;
    bytes[10..18].copy_from_slice(&data_len.to_be_bytes());
    LobLocator(bytes)
}

/// Write a locator: compressed length then the bytes, or a single 0
pub(crate) fn write_locator(buf: &mut WriteBuffer, locator: &[u8]) {
    if locator.is_empty() {
        buf.write_u8(0);
    } else {
        buf.write_uint(locator.len() as u64, 4, true, true);
        buf.write_clr(locator);
    }
}

/// Read an image prefetched with its locator: max size, size, chunk size,
/// the image, then the locator
pub(crate) fn read_inline_image(buf: &mut ReadBuffer) -> Result<Option<Vec<u8>>> {
    let max_size = buf.read_ub4()?;
    if max_size == 0 {
        return Ok(None);
    }
    let _size = buf.read_ub8()?;
    let _chunk_size = buf.read_ub4()?;
    let image = buf.read_clr()?;
    let _locator = buf.read_clr()?;
    Ok(Some(image).filter(|image| !image.is_empty()))
}

/// Bind an image behind a quasi locator
pub(crate) fn write_inline_image(buf: &mut WriteBuffer, image: &[u8]) {
    let locator = create_quasi_locator(image.len() as u64);
    write_locator(buf, locator.as_bytes());
    buf.write_clr(image);
}

/// Coder for CLOB, BLOB and BFILE locators
#[derive(Debug, Clone, Copy, Default)]
pub struct LobCoder;

impl TypeCoder for LobCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match value {
            Value::Lob(locator) => Ok(locator.as_bytes().to_vec()),
            other => Err(mismatch(other, desc.wire_type)),
        }
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        Ok(Value::Lob(LobLocator(data.to_vec())))
    }

    /// A size prefix, then the locator; attributes of user-defined types
    /// carry the locator as the only value
    fn read(&self, buf: &mut ReadBuffer, desc: &TypeDescriptor) -> Result<Value> {
        let prefix = match read_image(buf, desc)? {
            Some(prefix) => prefix,
            None => return Ok(Value::Null),
        };
        let locator = if desc.is_udt_param {
            prefix
        } else {
            buf.read_clr()?
        };
        if locator.is_empty() {
            return Ok(Value::Null);
        }
        Ok(Value::Lob(LobLocator(locator)))
    }

    fn write(&self, buf: &mut WriteBuffer, value: &Value, desc: &TypeDescriptor) -> Result<()> {
        match value {
            Value::Null => buf.write_u8(0),
            other => write_locator(buf, &self.encode(other, desc)?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WireType;

    #[test]
    fn test_locator_flags() {
        let mut bytes = vec![0u8; 40];
        let plain = LobLocator::new(bytes.clone());
        assert!(!plain.is_temporary());
        assert!(!plain.is_variable_width());

        bytes[6] = 0x81;
        bytes[7] = 0x41;
        let loc = LobLocator::new(bytes.clone());
        assert!(loc.is_variable_width());
        assert!(loc.is_read_only());
        assert!(loc.is_little_endian());
        assert!(loc.is_temporary());

        let mut value_based = vec![0u8; 40];
        value_based[4] = 0x20;
        let loc = LobLocator::new(value_based);
        assert!(loc.is_value_based());
        assert!(loc.is_temporary());

        assert!(!LobLocator::default().is_temporary());
    }

    #[test]
    fn test_quasi_locator_layout() {
        let loc = create_quasi_locator(0x0102);
        let bytes = loc.as_bytes();
        assert_eq!(bytes.len(), 40);
        assert_eq!((bytes[1], bytes[3], bytes[4], bytes[5], bytes[9]), (38, 4, 97, 8, 1));
        assert_eq!(&bytes[10..18], &[0, 0, 0, 0, 0, 0, 1, 2]);
        assert!(loc.is_quasi());
    }

    #[test]
    fn test_write_and_read_locator() {
        let desc = TypeDescriptor::new(WireType::Blob);
        let loc = LobLocator::new((1..=86).collect());
        let mut out = WriteBuffer::new();
        LobCoder.write(&mut out, &Value::Lob(loc.clone()), &desc).unwrap();
        assert_eq!(&out.as_slice()[..2], &[1, 86]);
        assert_eq!(out.as_slice()[2], 86);

        LobCoder.write(&mut out, &Value::Null, &desc).unwrap();
        assert_eq!(*out.as_slice().last().unwrap(), 0);

        let mut input = WriteBuffer::new();
        input.write_clr(&[0, 0, 0, 0, 0, 0, 0x10, 0]);
        input.write_clr(loc.as_bytes());
        input.write_u8(0);
        let mut buf = ReadBuffer::from_vec(input.as_slice().to_vec());
        assert_eq!(LobCoder.read(&mut buf, &desc).unwrap(), Value::Lob(loc));
        assert_eq!(LobCoder.read(&mut buf, &desc).unwrap(), Value::Null);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_udt_attribute_locator() {
        let mut desc = TypeDescriptor::new(WireType::Clob);
        desc.is_udt_param = true;
        let mut buf = ReadBuffer::from_vec(vec![3, 9, 8, 7]);
        assert_eq!(
            LobCoder.read(&mut buf, &desc).unwrap(),
            Value::Lob(LobLocator::new(vec![9, 8, 7]))
        );
    }
}
