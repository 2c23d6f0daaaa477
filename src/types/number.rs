//! Oracle NUMBER encoding and decoding
//!
//! Oracle NUMBER is stored in a variable-length format:
//! - First byte: exponent in base 100, excess 64, with the sign in the top bit
//! - Subsequent bytes: mantissa digits in base-100
//!
//! For positive numbers: exponent byte has high bit set, mantissa bytes are value + 1
//! For negative numbers: exponent byte is inverted, mantissa bytes are 101 - value,
//!                       and a trailing 102 byte is added for short mantissas

use std::fmt;
use std::str::FromStr;

use super::{mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::error::{Error, Result};

/// Maximum number of significant decimal digits
const MAX_DIGITS: usize = 40;

/// Terminator appended to negative mantissas
const NEGATIVE_TERMINATOR: u8 = 102;

/// Decimal mantissas shorter than this get the negative terminator
const TERMINATOR_LIMIT: usize = 21;

/// Image of zero
const ZERO: u8 = 0x80;

/// A NUMBER in its wire image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number(Vec<u8>);

/// Sign, significant digits and position of the decimal point
struct Decimal {
    negative: bool,
    digits: Vec<u8>,
    point: i32,
}

impl Number {
    /// Zero
    pub fn zero() -> Self {
        Number(vec![ZERO])
    }

    /// Wrap a wire image, checking it decodes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let number = Number(bytes);
        if !number.is_infinite() {
            number.decimal()?;
        }
        Ok(number)
    }

    /// Wire image
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the wire image
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Whether the value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == [ZERO]
    }

    /// Whether the image is one of the two infinity markers
    pub fn is_infinite(&self) -> bool {
        matches!(self.0.as_slice(), [0] | [255, 101])
    }

    /// Parse a decimal string, exponent notation included
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::DataConversionError(format!("invalid number: {:?}", text));
        let text = text.trim();
        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(i) => {
                let exponent: i32 = unsigned[i + 1..].parse().map_err(|_| invalid())?;
                (&unsigned[..i], exponent)
            }
            None => (unsigned, 0),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        let all_digits = int_part.bytes().chain(frac_part.bytes());
        let mut digits = Vec::with_capacity(int_part.len() + frac_part.len());
        for b in all_digits {
            if !b.is_ascii_digit() {
                return Err(invalid());
            }
            digits.push(b - b'0');
        }

        let leading = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..leading);
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if digits.is_empty() {
            return Ok(Self::zero());
        }
        if digits.len() > MAX_DIGITS {
            return Err(Error::DataConversionError(format!(
                "number {} has more than {} significant digits",
                text, MAX_DIGITS
            )));
        }
        let point = int_part.len() as i32 - leading as i32;
        let sci_exponent = point
            .checked_add(exponent)
            .map(|p| p - 1)
            .ok_or_else(invalid)?;
        pack(negative, &digits, sci_exponent)
            .map(Number)
            .ok_or_else(|| Error::DataConversionError(format!("number {} out of range", text)))
    }

    /// Exact image of an integer
    pub fn from_i64(value: i64) -> Self {
        let negative = value < 0;
        let mut digits: Vec<u8> = value
            .unsigned_abs()
            .to_string()
            .bytes()
            .map(|b| b - b'0')
            .collect();
        let sci_exponent = digits.len() as i32 - 1;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        if digits.is_empty() {
            return Self::zero();
        }
        // 19 digits and exponent 18 always fit
        Number(pack(negative, &digits, sci_exponent).unwrap_or_else(|| vec![ZERO]))
    }

    /// Image of the shortest decimal that round-trips `value`
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::DataConversionError(format!(
                "{} cannot be stored as NUMBER",
                value
            )));
        }
        Self::parse(&format!("{:e}", value))
    }

    /// Integer value, fractional digits truncated
    pub fn to_i64(&self) -> Result<i64> {
        let dec = self.decimal()?;
        let overflow = || Error::DataConversionError(format!("{} does not fit in i64", self));
        let mut result: i64 = 0;
        for i in 0..dec.point.max(0) {
            let digit = dec.digits.get(i as usize).copied().unwrap_or(0) as i64;
            let digit = if dec.negative { -digit } else { digit };
            result = result
                .checked_mul(10)
                .and_then(|r| r.checked_add(digit))
                .ok_or_else(overflow)?;
        }
        Ok(result)
    }

    /// Nearest f64
    pub fn to_f64(&self) -> Result<f64> {
        match self.0.as_slice() {
            [0] => return Ok(f64::NEG_INFINITY),
            [255, 101] => return Ok(f64::INFINITY),
            _ => {}
        }
        self.to_string()
            .parse()
            .map_err(|e| Error::DataConversionError(format!("cannot convert {}: {}", self, e)))
    }

    fn decimal(&self) -> Result<Decimal> {
        let invalid = || Error::DataConversionError(format!("invalid NUMBER image {:02X?}", self.0));
        let (&head, body) = self.0.split_first().ok_or_else(invalid)?;
        let negative = head & 0x80 == 0;
        if self.is_zero() {
            return Ok(Decimal {
                negative: false,
                digits: Vec::new(),
                point: 0,
            });
        }
        let exponent = if negative {
            (head ^ 0x7F) as i32 - 64
        } else {
            (head & 0x7F) as i32 - 64
        };
        let body = match body {
            [rest @ .., NEGATIVE_TERMINATOR] if negative => rest,
            _ => body,
        };
        if body.is_empty() {
            return Err(invalid());
        }

        let mut digits = Vec::with_capacity(body.len() * 2);
        for &b in body {
            let pair = if negative {
                101u8.checked_sub(b)
            } else {
                b.checked_sub(1)
            };
            let pair = pair.filter(|&p| p < 100).ok_or_else(invalid)?;
            digits.push(pair / 10);
            digits.push(pair % 10);
        }
        let mut point = exponent * 2;
        let leading = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..leading);
        point -= leading as i32;
        while digits.last() == Some(&0) {
            digits.pop();
        }
        Ok(Decimal {
            negative: negative && !digits.is_empty(),
            digits,
            point,
        })
    }
}

/// Build the image for significant digits `d1.d2d3… × 10^sci_exponent`
///
/// Returns `None` when the exponent does not fit the image.
fn pack(negative: bool, digits: &[u8], sci_exponent: i32) -> Option<Vec<u8>> {
    let mut mantissa = Vec::with_capacity(digits.len() + 2);
    if sci_exponent.rem_euclid(2) == 0 {
        mantissa.push(0);
    }
    mantissa.extend_from_slice(digits);
    let mantissa_len = mantissa.len();
    if mantissa_len % 2 == 1 {
        mantissa.push(0);
    }

    let mut exponent = sci_exponent;
    if exponent < 0 {
        exponent -= 1;
    }
    let exponent = exponent / 2 + 1;
    if !(-64..=63).contains(&exponent) {
        return None;
    }
    let biased = (exponent + 64) as u8;

    let mut out = Vec::with_capacity(mantissa.len() / 2 + 2);
    out.push(if negative { biased ^ 0x7F } else { biased | 0x80 });
    for pair in mantissa.chunks(2) {
        let value = pair[0] * 10 + pair[1];
        out.push(if negative { 100 - value + 1 } else { value + 1 });
    }
    if negative && mantissa_len < TERMINATOR_LIMIT {
        out.push(NEGATIVE_TERMINATOR);
    }
    Some(out)
}

impl fmt::Display for Number {
    /// Canonical decimal: no exponent, no `+`, no redundant zeros
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [0] => return f.write_str("-Infinity"),
            [255, 101] => return f.write_str("Infinity"),
            _ => {}
        }
        let dec = match self.decimal() {
            Ok(dec) => dec,
            Err(_) => return f.write_str("NaN"),
        };
        if dec.digits.is_empty() {
            return f.write_str("0");
        }
        let mut out = String::with_capacity(dec.digits.len() + 4);
        if dec.negative {
            out.push('-');
        }
        let digit = |d: &u8| char::from(b'0' + d);
        if dec.point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-dec.point) as usize));
            out.extend(dec.digits.iter().map(digit));
        } else {
            let point = dec.point as usize;
            for i in 0..point.max(dec.digits.len()) {
                if i == point {
                    out.push('.');
                }
                out.push(dec.digits.get(i).map_or('0', digit));
            }
        }
        f.write_str(&out)
    }
}

impl FromStr for Number {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Number::parse(s)
    }
}

/// Coder for NUMBER
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCoder;

impl TypeCoder for NumberCoder {
    fn encode(&self, value: &Value, _desc: &TypeDescriptor) -> Result<Vec<u8>> {
        let number = match value {
            Value::Number(s) | Value::Text(s) => Number::parse(s)?,
            Value::Integer(i) => Number::from_i64(*i),
            Value::Double(d) => Number::from_f64(*d)?,
            Value::Float(f) => Number::from_f64(*f as f64)?,
            Value::Bool(b) => Number::from_i64(*b as i64),
            other => return Err(mismatch(other, WireType::Number)),
        };
        Ok(number.into_bytes())
    }

    fn decode(&self, data: &[u8], _desc: &TypeDescriptor) -> Result<Value> {
        let number = Number::from_bytes(data.to_vec())?;
        Ok(Value::Number(number.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(text: &str) -> String {
        Number::parse(text).unwrap().to_string()
    }

    #[test]
    fn test_known_images() {
        assert_eq!(Number::parse("0").unwrap().as_bytes(), &[0x80]);
        assert_eq!(Number::parse("1").unwrap().as_bytes(), &[0xC1, 0x02]);
        assert_eq!(Number::parse("100").unwrap().as_bytes(), &[0xC2, 0x02]);
        assert_eq!(Number::parse("123.45").unwrap().as_bytes(), &[0xC2, 0x02, 0x18, 0x2E]);
        assert_eq!(Number::parse("0.5").unwrap().as_bytes(), &[0xC0, 0x33]);
        assert_eq!(Number::parse("-5").unwrap().as_bytes(), &[0x3E, 0x60, 0x66]);
        assert_eq!(Number::parse("-100").unwrap().as_bytes(), &[0x3D, 0x64, 0x66]);
    }

    #[test]
    fn test_canonical_strings() {
        assert_eq!(canonical("0"), "0");
        assert_eq!(canonical("-0"), "0");
        assert_eq!(canonical("+0.000"), "0");
        assert_eq!(canonical("007.50"), "7.5");
        assert_eq!(canonical("+12"), "12");
        assert_eq!(canonical("-0.0012"), "-0.0012");
        assert_eq!(canonical("1.5e3"), "1500");
        assert_eq!(canonical("25E-4"), "0.0025");
        assert_eq!(canonical("123456789012345678901234567890.123456789"), "123456789012345678901234567890.123456789");
        assert_eq!(canonical("-99999999999999999999999999999999999999"), "-99999999999999999999999999999999999999");
    }

    #[test]
    fn test_integer_helpers() {
        for v in [0i64, 1, -1, 10, 99, 100, -1234567, i64::MAX, i64::MIN] {
            let n = Number::from_i64(v);
            assert_eq!(n.to_i64().unwrap(), v, "value {}", v);
            assert_eq!(n.to_string(), v.to_string());
        }
        assert_eq!(Number::parse("-12.9").unwrap().to_i64().unwrap(), -12);
        assert_eq!(Number::parse("0.99").unwrap().to_i64().unwrap(), 0);
        assert!(Number::parse("1e30").unwrap().to_i64().is_err());
    }

    #[test]
    fn test_float_helpers() {
        assert_eq!(Number::from_f64(0.1).unwrap().to_string(), "0.1");
        assert_eq!(Number::from_f64(-2.5e-7).unwrap().to_string(), "-0.00000025");
        assert_eq!(Number::from_f64(1e20).unwrap().to_f64().unwrap(), 1e20);
        assert!(Number::from_f64(f64::NAN).is_err());
        assert_eq!(Number::from_bytes(vec![0]).unwrap().to_f64().unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Number::parse("").is_err());
        assert!(Number::parse("1.2.3").is_err());
        assert!(Number::parse("12a").is_err());
        assert!(Number::parse("1e200").is_err());
        assert!(Number::parse(&"1".repeat(41)).is_err());
        assert!(Number::from_bytes(vec![]).is_err());
        assert!(Number::from_bytes(vec![0xC1, 0xFF]).is_err());
    }

    #[test]
    fn test_coder_decode() {
        let desc = TypeDescriptor::new(WireType::Number);
        let bytes = NumberCoder.encode(&Value::Integer(-42), &desc).unwrap();
        assert_eq!(
            NumberCoder.decode(&bytes, &desc).unwrap(),
            Value::Number("-42".to_string())
        );
        assert!(NumberCoder.encode(&Value::Raw(vec![1]), &desc).is_err());
    }
}
