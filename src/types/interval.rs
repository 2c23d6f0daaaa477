//! INTERVAL YEAR TO MONTH and INTERVAL DAY TO SECOND
//!
//! Both images bias their fields so negative intervals sort correctly:
//! u32 fields are offset by `0x80000000`, single-byte fields by 60.

use super::{mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::error::{Error, Result};

const U32_BIAS: i64 = 0x8000_0000;
const U8_BIAS: i32 = 60;
const YM_LENGTH: usize = 5;
const DS_LENGTH: usize = 11;

/// INTERVAL YEAR TO MONTH
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntervalYm {
    #[allow(missing_docs)]
    pub years: i32,
    #[allow(missing_docs)]
    pub months: i32,
}

/// INTERVAL DAY TO SECOND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct IntervalDs {
    pub days: i32,
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
    pub nanos: i32,
}

fn biased_u32(value: i32) -> [u8; 4] {
    ((value as i64 + U32_BIAS) as u32).to_be_bytes()
}

fn unbiased_u32(bytes: &[u8]) -> i32 {
    (u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64 - U32_BIAS) as i32
}

fn biased_u8(value: i32) -> u8 {
    (value + U8_BIAS) as u8
}

fn unbiased_u8(byte: u8) -> i32 {
    byte as i32 - U8_BIAS
}

impl IntervalYm {
    fn encode(&self) -> Vec<u8> {
        let mut out = biased_u32(self.years).to_vec();
        out.push(biased_u8(self.months));
        out
    }

    fn decode(data: &[u8]) -> Result<Self> {
        check_length(data, YM_LENGTH, "YEAR TO MONTH")?;
        Ok(Self {
            years: unbiased_u32(&data[..4]),
            months: unbiased_u8(data[4]),
        })
    }
}

impl IntervalDs {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DS_LENGTH);
        out.extend_from_slice(&biased_u32(self.days));
        out.push(biased_u8(self.hours));
        out.push(biased_u8(self.minutes));
        out.push(biased_u8(self.seconds));
        out.extend_from_slice(&biased_u32(self.nanos));
        out
    }

    fn decode(data: &[u8]) -> Result<Self> {
        check_length(data, DS_LENGTH, "DAY TO SECOND")?;
        Ok(Self {
            days: unbiased_u32(&data[..4]),
            hours: unbiased_u8(data[4]),
            minutes: unbiased_u8(data[5]),
            seconds: unbiased_u8(data[6]),
            nanos: unbiased_u32(&data[7..11]),
        })
    }
}

fn check_length(data: &[u8], needed: usize, name: &str) -> Result<()> {
    if data.len() < needed {
        return Err(Error::DataConversionError(format!(
            "INTERVAL {} image needs {} bytes, got {}",
            name,
            needed,
            data.len()
        )));
    }
    Ok(())
}

/// Coder for both interval types
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalCoder;

impl TypeCoder for IntervalCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        match (value, desc.wire_type) {
            (Value::IntervalYm(ym), WireType::IntervalYm) => Ok(ym.encode()),
            (Value::IntervalDs(ds), WireType::IntervalDs) => Ok(ds.encode()),
            (other, wire_type) => Err(mismatch(other, wire_type)),
        }
    }

    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value> {
        if desc.wire_type == WireType::IntervalYm {
            IntervalYm::decode(data).map(Value::IntervalYm)
        } else {
            IntervalDs::decode(data).map(Value::IntervalDs)
        }
    }
}
