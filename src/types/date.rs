//! DATE and TIMESTAMP encoding and decoding
//!
//! ```text
//! Byte | DATE (7)          | TIMESTAMP (11)    | TIMESTAMP TZ (13)
//! -----+-------------------+-------------------+---------------------------
//!    0 | century + 100     |                   |
//!    1 | year % 100 + 100  |                   |
//!    2 | month             |     as DATE       |    as TIMESTAMP, in UTC
//!    3 | day               |                   |
//!  4-6 | h/m/s + 1         |                   |
//! 7-10 |                   | nanoseconds (BE)  |
//!   11 |                   |                   | hour + 20, or region high
//!   12 |                   |                   | minute + 60, or region low
//! ```
//!
//! A region id sets the top bit of byte 11. Region names come from the
//! registry the descriptor resolves against.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use super::{mismatch, TypeCoder, TypeDescriptor, Value, WireType};
use crate::error::{Error, Result};

const DATE_LENGTH: usize = 7;
const TIMESTAMP_LENGTH: usize = 11;
const TIMESTAMP_TZ_LENGTH: usize = 13;

/// Hour bias of the offset form
const TZ_HOUR_OFFSET: i32 = 20;
/// Minute bias of the offset form
const TZ_MINUTE_OFFSET: i32 = 60;
/// Byte 11 flag marking a region id
const REGION_FLAG: u8 = 0x80;

/// TIMESTAMP WITH TIME ZONE value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampTz {
    /// Instant and offset
    pub value: DateTime<FixedOffset>,
    /// Region name, when the server sent a known region id
    pub region: Option<String>,
}

impl TimestampTz {
    /// Value with a fixed offset only
    pub fn new(value: DateTime<FixedOffset>) -> Self {
        Self {
            value,
            region: None,
        }
    }

    /// Value that travels as a region id
    pub fn with_region(value: DateTime<FixedOffset>, region: impl Into<String>) -> Self {
        Self {
            value,
            region: Some(region.into()),
        }
    }
}

/// Decode the DATE part of an image, with nanoseconds when present
pub fn decode_date(data: &[u8]) -> Result<NaiveDateTime> {
    if data.len() < DATE_LENGTH {
        return Err(Error::DataConversionError(format!(
            "date image too short ({} bytes)",
            data.len()
        )));
    }
    let invalid = || Error::DataConversionError(format!("invalid date image {:02X?}", data));
    let year = (data[0] as i32 - 100) * 100 + (data[1] as i32 - 100);
    let nanos = if data.len() >= TIMESTAMP_LENGTH {
        u32::from_be_bytes([data[7], data[8], data[9], data[10]])
    } else {
        0
    };
    let time = |b: u8| b.checked_sub(1).map(u32::from).ok_or_else(invalid);
    NaiveDate::from_ymd_opt(year, data[2] as u32, data[3] as u32)
        .and_then(|d| {
            let (h, m, s) = (time(data[4]).ok()?, time(data[5]).ok()?, time(data[6]).ok()?);
            d.and_hms_nano_opt(h, m, s, nanos)
        })
        .ok_or_else(invalid)
}

/// Encode a date-time, with the nanosecond field when `with_nanos` is set
pub fn encode_date(value: &NaiveDateTime, with_nanos: bool) -> Vec<u8> {
    let year = value.year();
    let mut out = Vec::with_capacity(TIMESTAMP_TZ_LENGTH);
    out.push((year / 100 + 100) as u8);
    out.push((year % 100 + 100) as u8);
    out.push(value.month() as u8);
    out.push(value.day() as u8);
    out.push(value.hour() as u8 + 1);
    out.push(value.minute() as u8 + 1);
    out.push(value.second() as u8 + 1);
    if with_nanos {
        out.extend_from_slice(&value.nanosecond().to_be_bytes());
    }
    out
}

fn encode_timestamp_tz(value: &TimestampTz, desc: &TypeDescriptor) -> Vec<u8> {
    let mut out = encode_date(&value.value.naive_utc(), true);
    let region_id = value
        .region
        .as_deref()
        .and_then(|name| desc.registry().time_zone_region_id(name));
    match region_id {
        Some(id) => {
            out.push((((id & 0x1FC0) >> 6) as u8) | REGION_FLAG);
            out.push(((id & 0x3F) << 2) as u8);
        }
        None => {
            let seconds = value.value.offset().local_minus_utc();
            out.push((seconds / 3600 + TZ_HOUR_OFFSET) as u8);
            out.push(((seconds % 3600) / 60 + TZ_MINUTE_OFFSET) as u8);
        }
    }
    out
}

fn decode_timestamp_tz(data: &[u8], desc: &TypeDescriptor) -> Result<TimestampTz> {
    let utc = decode_date(data)?;
    let utc_offset = FixedOffset::east_opt(0).ok_or_else(|| Error::protocol("utc offset"))?;
    if data.len() < TIMESTAMP_TZ_LENGTH {
        return Ok(TimestampTz::new(utc_offset.from_utc_datetime(&utc)));
    }
    if data[11] & REGION_FLAG != 0 {
        let id = (((data[11] & 0x7F) as u16) << 6) | (data[12] >> 2) as u16;
        let region = desc.registry().time_zone_region(id).map(str::to_string);
        if region.is_none() {
            tracing::debug!(target: "oracle_tns", region = id, "unknown time zone region");
        }
        return Ok(TimestampTz {
            value: utc_offset.from_utc_datetime(&utc),
            region,
        });
    }
    let hours = data[11] as i32 - TZ_HOUR_OFFSET;
    let minutes = data[12] as i32 - TZ_MINUTE_OFFSET;
    let offset = FixedOffset::east_opt(hours * 3600 + minutes * 60).ok_or_else(|| {
        Error::DataConversionError(format!("invalid time zone offset {}:{}", hours, minutes))
    })?;
    Ok(TimestampTz::new(offset.from_utc_datetime(&utc)))
}

/// Coder for DATE, TIMESTAMP, TIMESTAMP WITH TIME ZONE and WITH LOCAL TIME ZONE
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCoder;

impl TypeCoder for DateCoder {
    fn encode(&self, value: &Value, desc: &TypeDescriptor) -> Result<Vec<u8>> {
        let naive = match value {
            Value::Date(d) | Value::Timestamp(d) => *d,
            Value::TimestampTz(tz) if desc.wire_type == WireType::TimestampTz => {
                return Ok(encode_timestamp_tz(tz, desc))
            }
            Value::TimestampTz(tz) => tz.value.naive_local(),
            other => return Err(mismatch(other, desc.wire_type)),
        };
        Ok(match desc.wire_type {
            WireType::Date => encode_date(&naive, false),
            WireType::TimestampTz => {
                let utc = FixedOffset::east_opt(0).ok_or_else(|| Error::protocol("utc offset"))?;
                encode_timestamp_tz(&TimestampTz::new(utc.from_utc_datetime(&naive)), desc)
            }
            _ => encode_date(&naive, true),
        })
    }

    fn decode(&self, data: &[u8], desc: &TypeDescriptor) -> Result<Value> {
        match desc.wire_type {
            WireType::Date => decode_date(data).map(Value::Date),
            WireType::TimestampTz => decode_timestamp_tz(data, desc).map(Value::TimestampTz),
            _ => decode_date(data).map(Value::Timestamp),
        }
    }
}
