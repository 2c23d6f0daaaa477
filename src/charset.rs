//! Charset converters
//!
//! Text crosses the wire in the database charset (or AL16UTF16 for NCHAR
//! data). The converter is picked from the charset id negotiated by TCP
//! negotiation; ids without a table fall back to UTF-8.

use crate::constants::charset;

/// Byte replacing characters the target charset cannot represent
const REPLACEMENT: u8 = b'?';

/// UTF-16 little-endian charset id
pub const AL16UTF16LE: u16 = 2002;

/// String encoder/decoder for one charset id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringConverter {
    /// AL32UTF8, UTF8 and friends
    Utf8(u16),
    /// AL16UTF16
    Utf16Be,
    /// AL16UTF16LE
    Utf16Le,
    /// WE8ISO8859P1
    Latin1,
    /// US7ASCII
    Ascii,
}

impl Default for StringConverter {
    fn default() -> Self {
        StringConverter::Utf8(charset::AL32UTF8)
    }
}

impl StringConverter {
    /// Converter for a charset id
    pub fn for_charset(id: u16) -> Self {
        match id {
            charset::AL16UTF16 => StringConverter::Utf16Be,
            AL16UTF16LE => StringConverter::Utf16Le,
            charset::WE8ISO8859P1 => StringConverter::Latin1,
            charset::US7ASCII => StringConverter::Ascii,
            other => StringConverter::Utf8(other),
        }
    }

    /// Converter used for NCHAR data
    pub fn nchar() -> Self {
        StringConverter::Utf16Be
    }

    /// Charset id handled by this converter
    pub fn charset_id(&self) -> u16 {
        match self {
            StringConverter::Utf8(id) => *id,
            StringConverter::Utf16Be => charset::AL16UTF16,
            StringConverter::Utf16Le => AL16UTF16LE,
            StringConverter::Latin1 => charset::WE8ISO8859P1,
            StringConverter::Ascii => charset::US7ASCII,
        }
    }

    /// Maximum encoded bytes per character
    pub fn max_bytes_per_char(&self) -> usize {
        match self {
            StringConverter::Utf8(870) | StringConverter::Utf8(871) => 3,
            StringConverter::Utf8(_) => 4,
            StringConverter::Utf16Be | StringConverter::Utf16Le => 2,
            StringConverter::Latin1 | StringConverter::Ascii => 1,
        }
    }

    /// Encode a string into the charset
    pub fn encode(&self, input: &str) -> Vec<u8> {
        match self {
            StringConverter::Utf8(_) => input.as_bytes().to_vec(),
            StringConverter::Utf16Be => input.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            StringConverter::Utf16Le => input.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            StringConverter::Latin1 => input
                .chars()
                .map(|c| if (c as u32) < 0x100 { c as u8 } else { REPLACEMENT })
                .collect(),
            StringConverter::Ascii => input
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { REPLACEMENT })
                .collect(),
        }
    }

    /// Decode bytes from the charset
    ///
    /// An odd trailing byte in UTF-16 input is padded with zero.
    pub fn decode(&self, input: &[u8]) -> String {
        match self {
            StringConverter::Utf8(_) => String::from_utf8_lossy(input).into_owned(),
            StringConverter::Utf16Be => decode_utf16(input, u16::from_be_bytes),
            StringConverter::Utf16Le => decode_utf16(input, u16::from_le_bytes),
            StringConverter::Latin1 => input.iter().map(|&b| b as char).collect(),
            StringConverter::Ascii => input
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }
}

fn decode_utf16(input: &[u8], word: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = input
        .chunks(2)
        .map(|pair| word([pair[0], pair.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}
