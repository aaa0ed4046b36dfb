//! Per-type converters between [`SqlValue`] and [`WireValue`].
//!
//! Each converter owns one family of column types. NULL never reaches a converter;
//! the [`ValueMapper`](super::ValueMapper) passes it through.

use std::fmt;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{Decimal, SqlValue, WireValue};
use crate::error::{Direction, TypeConversionError};
use crate::types::AbstractType;

type Converted<T> = Result<T, TypeConversionError>;

/// Converts values of one column type family in both directions.
pub trait ValueConverter: fmt::Debug + Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Converts a non-null host value for a column of type `ty`.
    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue>;

    /// Converts a non-null wire value read from a column of type `ty`.
    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue>;
}

/// How UUIDs are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidStorage {
    /// `CHAR(36)` hyphenated text.
    #[default]
    Char36,
    /// `BINARY(16)` raw bytes.
    Binary16,
}

/// Text layout used when sending temporal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeStyle {
    /// `YYYY-MM-DD HH:MM:SS`, fraction only when non-zero (before 8.0).
    Legacy,
    /// `YYYY-MM-DDTHH:MM:SS.ffffff` (8.0 onward).
    Iso,
}

impl DateTimeStyle {
    fn format_datetime(self, value: &NaiveDateTime) -> String {
        match self {
            Self::Legacy if value.nanosecond() == 0 => {
                value.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            Self::Legacy => value.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            Self::Iso => value.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }

    fn format_time(self, value: &NaiveTime) -> String {
        match self {
            Self::Legacy if value.nanosecond() == 0 => {
                value.format("%H:%M:%S").to_string()
            }
            Self::Legacy | Self::Iso => value.format("%H:%M:%S%.6f").to_string(),
        }
    }
}

fn to_error(value: &SqlValue, ty: AbstractType, reason: impl Into<String>) -> TypeConversionError {
    TypeConversionError::new(value, ty, Direction::ToWire, reason)
}

fn from_error(value: &WireValue, ty: AbstractType, reason: impl Into<String>) -> TypeConversionError {
    TypeConversionError::new(value, ty, Direction::FromWire, reason)
}

fn utf8(value: &WireValue, ty: AbstractType, bytes: Vec<u8>) -> Converted<String> {
    String::from_utf8(bytes).map_err(|e| from_error(value, ty, "invalid UTF-8").with_source(e))
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Parses `[-]H+:MM:SS[.ffffff]` into signed microseconds; hours may exceed 23.
fn parse_time_micros(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, body) = text
        .strip_prefix('-')
        .map_or((false, text), |rest| (true, rest));
    let (clock, fraction) = body.split_once('.').unwrap_or((body, ""));
    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next().unwrap_or("0").parse().ok()?;
    if parts.next().is_some()
        || hours < 0
        || !(0..=59).contains(&minutes)
        || !(0..=59).contains(&seconds)
    {
        return None;
    }
    let mut micros_text: String = fraction.chars().take(6).collect();
    if !micros_text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    while micros_text.len() < 6 {
        micros_text.push('0');
    }
    let micros: i64 = micros_text.parse().ok()?;
    // Saturates: anything past the day bound is clamped later anyway.
    let total = hours
        .checked_mul(3_600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .and_then(|secs| secs.checked_mul(1_000_000))
        .and_then(|us| us.checked_add(micros))
        .unwrap_or(i64::MAX);
    Some(if negative { -total } else { total })
}

/// Folds a signed duration into a time of day: negative becomes midnight, a day or more
/// becomes the last microsecond of the day.
fn clamp_time(micros: i64) -> NaiveTime {
    let clamped = micros.clamp(0, MICROS_PER_DAY - 1);
    if clamped != micros {
        debug!(micros, "Clamped out-of-range TIME value");
    }
    let secs = u32::try_from(clamped / 1_000_000).unwrap_or_default();
    let nanos = u32::try_from(clamped % 1_000_000).unwrap_or_default() * 1_000;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).unwrap_or(NaiveTime::MIN)
}

fn duration_micros(delta: TimeDelta) -> i64 {
    delta.num_microseconds().unwrap_or(if delta < TimeDelta::zero() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// `BOOLEAN` as `TINYINT(1)`: sent as 1/0, any non-zero reads as true.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl ValueConverter for BooleanConverter {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let flag = match value {
            SqlValue::Bool(b) => *b,
            SqlValue::Int(n) => *n != 0,
            SqlValue::UInt(n) => *n != 0,
            SqlValue::Text(s) => parse_bool(s).ok_or_else(|| to_error(value, ty, "not a boolean"))?,
            _ => return Err(to_error(value, ty, "expected a boolean")),
        };
        Ok(WireValue::Int(i64::from(flag)))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        let flag = match &value {
            WireValue::Int(n) => *n != 0,
            WireValue::UInt(n) => *n != 0,
            WireValue::Text(s) => {
                parse_bool(s).ok_or_else(|| from_error(&value, ty, "not a boolean"))?
            }
            WireValue::Bytes(b) if b.len() == 1 => b[0] != 0,
            _ => return Err(from_error(&value, ty, "expected an integer flag")),
        };
        Ok(SqlValue::Bool(flag))
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Integer columns, range-checked against the signed/unsigned span of the type.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerConverter;

impl IntegerConverter {
    fn bounds(ty: AbstractType) -> (i128, i128) {
        match ty {
            AbstractType::TinyInt => (-128, 255),
            AbstractType::SmallInt => (-32_768, 65_535),
            AbstractType::Integer => (i128::from(i32::MIN), i128::from(u32::MAX)),
            _ => (i128::from(i64::MIN), i128::from(u64::MAX)),
        }
    }

    fn narrow(value: i128) -> Option<WireValue> {
        i64::try_from(value)
            .map(WireValue::Int)
            .ok()
            .or_else(|| u64::try_from(value).ok().map(WireValue::UInt))
    }

    fn check(ty: AbstractType, value: i128) -> Result<i128, String> {
        let (min, max) = Self::bounds(ty);
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(format!("{value} is outside {min}..={max}"))
        }
    }
}

impl ValueConverter for IntegerConverter {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let wide: i128 = match value {
            SqlValue::Int(n) => i128::from(*n),
            SqlValue::UInt(n) => i128::from(*n),
            SqlValue::Bool(b) => i128::from(*b),
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| to_error(value, ty, "not an integer").with_source(e))?,
            SqlValue::Decimal(d) if d.scale() == 0 => d
                .as_str()
                .parse()
                .map_err(|e| to_error(value, ty, "not an integer").with_source(e))?,
            _ => return Err(to_error(value, ty, "expected an integer")),
        };
        let checked = Self::check(ty, wide).map_err(|reason| to_error(value, ty, reason))?;
        Self::narrow(checked).ok_or_else(|| to_error(value, ty, "integer overflow"))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match value {
            WireValue::Int(n) => Ok(SqlValue::Int(n)),
            WireValue::UInt(n) => Ok(SqlValue::UInt(n)),
            WireValue::Text(ref s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .map(SqlValue::Int)
                    .or_else(|_| trimmed.parse::<u64>().map(SqlValue::UInt))
                    .map_err(|e| from_error(&value, ty, "not an integer").with_source(e))
            }
            WireValue::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(SqlValue::Int(f as i64)),
            other => Err(from_error(&other, ty, "expected an integer")),
        }
    }
}

/// `FLOAT` and `DOUBLE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatConverter;

impl ValueConverter for FloatConverter {
    fn name(&self) -> &'static str {
        "float"
    }

    #[allow(clippy::cast_precision_loss)]
    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let float = match value {
            SqlValue::Float(f) => *f,
            SqlValue::Int(n) => *n as f64,
            SqlValue::UInt(n) => *n as f64,
            SqlValue::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| to_error(value, ty, "decimal out of float range"))?,
            SqlValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| to_error(value, ty, "not a number").with_source(e))?,
            _ => return Err(to_error(value, ty, "expected a number")),
        };
        Ok(WireValue::Float(float))
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match value {
            WireValue::Float(f) => Ok(SqlValue::Float(f)),
            WireValue::Int(n) => Ok(SqlValue::Float(n as f64)),
            WireValue::UInt(n) => Ok(SqlValue::Float(n as f64)),
            WireValue::Text(ref s) => s
                .trim()
                .parse()
                .map(SqlValue::Float)
                .map_err(|e| from_error(&value, ty, "not a number").with_source(e)),
            other => Err(from_error(&other, ty, "expected a number")),
        }
    }
}

/// `DECIMAL`, always sent as text so no float rounding happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalConverter;

impl ValueConverter for DecimalConverter {
    fn name(&self) -> &'static str {
        "decimal"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let decimal = match value {
            SqlValue::Decimal(d) => d.clone(),
            SqlValue::Int(n) => Decimal::from(*n),
            SqlValue::UInt(n) => n
                .to_string()
                .parse()
                .map_err(|e| to_error(value, ty, "not a decimal").with_source(e))?,
            SqlValue::Float(f) => {
                Decimal::from_f64(*f).ok_or_else(|| to_error(value, ty, "float is not finite"))?
            }
            SqlValue::Text(s) => s
                .parse()
                .map_err(|e| to_error(value, ty, "not a decimal").with_source(e))?,
            _ => return Err(to_error(value, ty, "expected a decimal")),
        };
        Ok(WireValue::Text(decimal.to_string()))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        let text = match &value {
            WireValue::Text(s) => s.clone(),
            WireValue::Bytes(b) => utf8(&value, ty, b.clone())?,
            WireValue::Int(n) => n.to_string(),
            WireValue::UInt(n) => n.to_string(),
            WireValue::Float(f) => {
                return Decimal::from_f64(*f)
                    .map(SqlValue::Decimal)
                    .ok_or_else(|| from_error(&value, ty, "float is not finite"))
            }
            _ => return Err(from_error(&value, ty, "expected a decimal")),
        };
        text.parse()
            .map(SqlValue::Decimal)
            .map_err(|e| from_error(&value, ty, "not a decimal").with_source(e))
    }
}

/// `CHAR`, `VARCHAR`, `TEXT` and custom text columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextConverter;

impl ValueConverter for TextConverter {
    fn name(&self) -> &'static str {
        "text"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let text = match value {
            SqlValue::Text(s) | SqlValue::Enum(s) | SqlValue::Geometry(s) => s.clone(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::UInt(n) => n.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Bool(b) => i64::from(*b).to_string(),
            SqlValue::Uuid(u) => u.hyphenated().to_string(),
            SqlValue::Json(v) => v.to_string(),
            _ => return Err(to_error(value, ty, "expected text")),
        };
        Ok(WireValue::Text(text))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match value {
            WireValue::Text(s) => Ok(SqlValue::Text(s)),
            WireValue::Bytes(ref b) => utf8(&value, ty, b.clone()).map(SqlValue::Text),
            WireValue::Int(n) => Ok(SqlValue::Text(n.to_string())),
            WireValue::UInt(n) => Ok(SqlValue::Text(n.to_string())),
            WireValue::Float(f) => Ok(SqlValue::Text(f.to_string())),
            other => Err(from_error(&other, ty, "expected text")),
        }
    }
}

/// `BLOB` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobConverter;

impl ValueConverter for BlobConverter {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        match value {
            SqlValue::Bytes(b) => Ok(WireValue::Bytes(b.clone())),
            SqlValue::Text(s) => Ok(WireValue::Bytes(s.as_bytes().to_vec())),
            _ => Err(to_error(value, ty, "expected bytes")),
        }
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match value {
            WireValue::Bytes(b) => Ok(SqlValue::Bytes(b)),
            WireValue::Text(s) => Ok(SqlValue::Bytes(s.into_bytes())),
            other => Err(from_error(&other, ty, "expected bytes")),
        }
    }
}

/// `DATE` columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter;

impl ValueConverter for DateConverter {
    fn name(&self) -> &'static str {
        "date"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let date = match value {
            SqlValue::Date(d) => *d,
            SqlValue::DateTime(dt) => dt.date(),
            SqlValue::Timestamp(ts) => ts.date_naive(),
            SqlValue::Text(s) => parse_datetime_text(s)
                .map(|dt| dt.date())
                .ok_or_else(|| to_error(value, ty, "not a date"))?,
            _ => return Err(to_error(value, ty, "expected a date")),
        };
        Ok(WireValue::Text(date.format("%Y-%m-%d").to_string()))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match &value {
            WireValue::Date(d) => Ok(SqlValue::Date(*d)),
            WireValue::DateTime(dt) => Ok(SqlValue::Date(dt.date())),
            WireValue::Text(s) => parse_datetime_text(s)
                .map(|dt| SqlValue::Date(dt.date()))
                .ok_or_else(|| from_error(&value, ty, "not a date")),
            _ => Err(from_error(&value, ty, "expected a date")),
        }
    }
}

/// `TIME` columns, normalized to a time of day.
#[derive(Debug, Clone, Copy)]
pub struct TimeConverter {
    style: DateTimeStyle,
}

impl TimeConverter {
    /// Creates a converter sending times in `style`.
    #[must_use]
    pub const fn new(style: DateTimeStyle) -> Self {
        Self { style }
    }
}

impl ValueConverter for TimeConverter {
    fn name(&self) -> &'static str {
        "time"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let time = match value {
            SqlValue::Time(t) => *t,
            SqlValue::DateTime(dt) => dt.time(),
            SqlValue::Text(s) => parse_time_micros(s)
                .map(clamp_time)
                .ok_or_else(|| to_error(value, ty, "not a time"))?,
            _ => return Err(to_error(value, ty, "expected a time")),
        };
        Ok(WireValue::Text(self.style.format_time(&time)))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match &value {
            WireValue::Time(t) => Ok(SqlValue::Time(*t)),
            WireValue::Duration(d) => Ok(SqlValue::Time(clamp_time(duration_micros(*d)))),
            WireValue::DateTime(dt) => Ok(SqlValue::Time(dt.time())),
            WireValue::Text(s) => parse_time_micros(s)
                .map(|micros| SqlValue::Time(clamp_time(micros)))
                .ok_or_else(|| from_error(&value, ty, "not a time")),
            _ => Err(from_error(&value, ty, "expected a time")),
        }
    }
}

/// `DATETIME` and `TIMESTAMP` columns.
///
/// Offset-bearing values are shifted into the session offset before sending. Reads of
/// `TIMESTAMP` columns attach the session offset; `DATETIME` reads stay naive.
#[derive(Debug, Clone, Copy)]
pub struct DateTimeConverter {
    style: DateTimeStyle,
    session_offset: FixedOffset,
}

impl DateTimeConverter {
    /// Creates a converter for the given text style and session offset.
    #[must_use]
    pub const fn new(style: DateTimeStyle, session_offset: FixedOffset) -> Self {
        Self {
            style,
            session_offset,
        }
    }

    fn naive(&self, value: &SqlValue) -> Option<NaiveDateTime> {
        match value {
            SqlValue::DateTime(dt) => Some(*dt),
            SqlValue::Timestamp(ts) => Some(ts.with_timezone(&self.session_offset).naive_local()),
            SqlValue::Date(d) => d.and_hms_opt(0, 0, 0),
            SqlValue::Text(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                .map(|ts| ts.with_timezone(&self.session_offset).naive_local())
                .ok()
                .or_else(|| parse_datetime_text(s)),
            _ => None,
        }
    }
}

impl ValueConverter for DateTimeConverter {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        self.naive(value)
            .map(|dt| WireValue::Text(self.style.format_datetime(&dt)))
            .ok_or_else(|| to_error(value, ty, "expected a datetime"))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        let naive = match &value {
            WireValue::DateTime(dt) => *dt,
            WireValue::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| from_error(&value, ty, "invalid date"))?,
            WireValue::Text(s) => {
                parse_datetime_text(s).ok_or_else(|| from_error(&value, ty, "not a datetime"))?
            }
            _ => return Err(from_error(&value, ty, "expected a datetime")),
        };
        if ty == AbstractType::Timestamp {
            naive
                .and_local_timezone(self.session_offset)
                .single()
                .map(SqlValue::Timestamp)
                .ok_or_else(|| from_error(&value, ty, "ambiguous local time"))
        } else {
            Ok(SqlValue::DateTime(naive))
        }
    }
}

/// UUIDs as `CHAR(36)` text or `BINARY(16)` bytes; both are accepted on read.
#[derive(Debug, Clone, Copy)]
pub struct UuidConverter {
    storage: UuidStorage,
}

impl UuidConverter {
    /// Creates a converter sending UUIDs in `storage` form.
    #[must_use]
    pub const fn new(storage: UuidStorage) -> Self {
        Self { storage }
    }
}

impl ValueConverter for UuidConverter {
    fn name(&self) -> &'static str {
        "uuid"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let uuid = match value {
            SqlValue::Uuid(u) => *u,
            SqlValue::Text(s) => Uuid::parse_str(s.trim())
                .map_err(|e| to_error(value, ty, "not a UUID").with_source(e))?,
            SqlValue::Bytes(b) => Uuid::from_slice(b)
                .map_err(|e| to_error(value, ty, "not a UUID").with_source(e))?,
            _ => return Err(to_error(value, ty, "expected a UUID")),
        };
        Ok(match self.storage {
            UuidStorage::Char36 => WireValue::Text(uuid.hyphenated().to_string()),
            UuidStorage::Binary16 => WireValue::Bytes(uuid.as_bytes().to_vec()),
        })
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        let parsed = match &value {
            WireValue::Text(s) => Uuid::parse_str(s.trim()),
            WireValue::Bytes(b) if b.len() == 16 => Uuid::from_slice(b),
            WireValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => Uuid::parse_str(s.trim()),
                Err(e) => return Err(from_error(&value, ty, "not a UUID").with_source(e)),
            },
            _ => return Err(from_error(&value, ty, "expected a UUID")),
        };
        parsed
            .map(SqlValue::Uuid)
            .map_err(|e| from_error(&value, ty, "not a UUID").with_source(e))
    }
}

/// `JSON` documents, and arrays stored as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl JsonConverter {
    fn document(value: &SqlValue) -> Option<serde_json::Value> {
        Some(match value {
            SqlValue::Json(v) => v.clone(),
            SqlValue::Bool(b) => serde_json::Value::Bool(*b),
            SqlValue::Int(n) => serde_json::Value::from(*n),
            SqlValue::UInt(n) => serde_json::Value::from(*n),
            SqlValue::Float(f) => serde_json::Value::from(*f),
            SqlValue::Set(members) => serde_json::Value::from(members.clone()),
            SqlValue::Text(s) => serde_json::from_str(s).ok()?,
            _ => return None,
        })
    }
}

impl ValueConverter for JsonConverter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        let document =
            Self::document(value).ok_or_else(|| to_error(value, ty, "expected a JSON document"))?;
        if ty == AbstractType::Array && !document.is_array() {
            return Err(to_error(value, ty, "expected a JSON array"));
        }
        serde_json::to_string(&document)
            .map(WireValue::Text)
            .map_err(|e| to_error(value, ty, "cannot serialize JSON").with_source(e))
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        let parsed: serde_json::Result<serde_json::Value> = match &value {
            WireValue::Text(s) => serde_json::from_str(s),
            WireValue::Bytes(b) => serde_json::from_slice(b),
            _ => return Err(from_error(&value, ty, "expected JSON text")),
        };
        let document = parsed.map_err(|e| from_error(&value, ty, "invalid JSON").with_source(e))?;
        if ty == AbstractType::Array && !document.is_array() {
            return Err(from_error(&value, ty, "expected a JSON array"));
        }
        Ok(SqlValue::Json(document))
    }
}

/// `ENUM` labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumConverter;

impl ValueConverter for EnumConverter {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        match value {
            SqlValue::Enum(s) | SqlValue::Text(s) => Ok(WireValue::Text(s.clone())),
            _ => Err(to_error(value, ty, "expected an enum label")),
        }
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match value {
            WireValue::Text(s) => Ok(SqlValue::Enum(s)),
            WireValue::Bytes(ref b) => utf8(&value, ty, b.clone()).map(SqlValue::Enum),
            other => Err(from_error(&other, ty, "expected an enum label")),
        }
    }
}

/// `SET` members, sent comma-joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetConverter;

impl ValueConverter for SetConverter {
    fn name(&self) -> &'static str {
        "set"
    }

    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        match value {
            SqlValue::Set(members) => {
                if members.iter().any(|m| m.contains(',')) {
                    return Err(to_error(value, ty, "SET members cannot contain commas"));
                }
                Ok(WireValue::Text(members.join(",")))
            }
            SqlValue::Text(s) => Ok(WireValue::Text(s.clone())),
            _ => Err(to_error(value, ty, "expected SET members")),
        }
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        let text = match value {
            WireValue::Text(s) => s,
            WireValue::Bytes(ref b) => utf8(&value, ty, b.clone())?,
            other => return Err(from_error(&other, ty, "expected SET members")),
        };
        Ok(SqlValue::Set(
            text.split(',')
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}

/// Spatial columns as well-known text.
///
/// Text is passed through. The server's internal format (4-byte SRID followed by WKB)
/// is decoded for points only; other shapes should be selected with `ST_AsText`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryConverter;

impl GeometryConverter {
    const INTERNAL_POINT_LEN: usize = 25;

    fn decode_point(bytes: &[u8]) -> Option<String> {
        if bytes.len() != Self::INTERNAL_POINT_LEN {
            return None;
        }
        let wkb = &bytes[4..];
        let little_endian = match wkb[0] {
            0 => false,
            1 => true,
            _ => return None,
        };
        let read_u32 = |b: &[u8]| -> Option<u32> {
            let arr: [u8; 4] = b.try_into().ok()?;
            Some(if little_endian {
                u32::from_le_bytes(arr)
            } else {
                u32::from_be_bytes(arr)
            })
        };
        let read_f64 = |b: &[u8]| -> Option<f64> {
            let arr: [u8; 8] = b.try_into().ok()?;
            Some(if little_endian {
                f64::from_le_bytes(arr)
            } else {
                f64::from_be_bytes(arr)
            })
        };
        if read_u32(&wkb[1..5])? != 1 {
            return None;
        }
        let x = read_f64(&wkb[5..13])?;
        let y = read_f64(&wkb[13..21])?;
        Some(format!("POINT({x} {y})"))
    }
}

impl ValueConverter for GeometryConverter {
    fn name(&self) -> &'static str {
        "geometry"
    }

    // The builder wraps geometry placeholders in ST_GeomFromText; plain text declared as
    // a geometry is bound as is and the template has to wrap it.
    fn to_wire(&self, value: &SqlValue, ty: AbstractType) -> Converted<WireValue> {
        match value {
            SqlValue::Geometry(wkt) | SqlValue::Text(wkt) => Ok(WireValue::Text(wkt.clone())),
            _ => Err(to_error(value, ty, "expected well-known text")),
        }
    }

    fn from_wire(&self, value: WireValue, ty: AbstractType) -> Converted<SqlValue> {
        match &value {
            WireValue::Text(wkt) => Ok(SqlValue::Geometry(wkt.clone())),
            WireValue::Bytes(b) => Self::decode_point(b).map(SqlValue::Geometry).ok_or_else(|| {
                from_error(
                    &value,
                    ty,
                    "only POINT values can be decoded from the internal format, select ST_AsText instead",
                )
            }),
            _ => Err(from_error(&value, ty, "expected geometry")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_micros() {
        assert_eq!(parse_time_micros("01:02:03"), Some(3_723_000_000));
        assert_eq!(parse_time_micros("00:00:00.5"), Some(500_000));
        assert_eq!(parse_time_micros("-01:00:00"), Some(-3_600_000_000));
        assert_eq!(parse_time_micros("838:59:59"), Some(3_020_399_000_000));
        assert_eq!(parse_time_micros("12:61:00"), None);
        assert_eq!(parse_time_micros("noon"), None);
        assert_eq!(parse_time_micros("--01:00:00"), None);
        assert_eq!(parse_time_micros("01:-5:00"), None);
    }

    #[test]
    fn test_parse_time_micros_saturates_huge_hours() {
        assert_eq!(parse_time_micros("9999999999999999:00:00"), Some(i64::MAX));
        assert_eq!(parse_time_micros("-9999999999999999:00:00"), Some(-i64::MAX));
        assert_eq!(parse_time_micros("99999999999999999999:00:00"), None);
    }

    #[test]
    fn test_clamp_time_boundaries() {
        assert_eq!(clamp_time(-1), NaiveTime::MIN);
        assert_eq!(
            clamp_time(MICROS_PER_DAY + 5),
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap()
        );
        assert_eq!(
            clamp_time(3_723_000_123),
            NaiveTime::from_hms_micro_opt(1, 2, 3, 123).unwrap()
        );
    }

    #[test]
    fn test_legacy_datetime_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        assert_eq!(
            DateTimeStyle::Legacy.format_datetime(&dt),
            "2024-05-06 07:08:09"
        );
        assert_eq!(
            DateTimeStyle::Iso.format_datetime(&dt),
            "2024-05-06T07:08:09.000000"
        );
        let with_micros = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_micro_opt(7, 8, 9, 42)
            .unwrap();
        assert_eq!(
            DateTimeStyle::Legacy.format_datetime(&with_micros),
            "2024-05-06 07:08:09.000042"
        );
    }

    #[test]
    fn test_decode_internal_point() {
        let mut bytes = vec![0, 0, 0, 0, 1, 1, 0, 0, 0];
        bytes.extend_from_slice(&1.5_f64.to_le_bytes());
        bytes.extend_from_slice(&(-2.0_f64).to_le_bytes());
        assert_eq!(
            GeometryConverter::decode_point(&bytes).as_deref(),
            Some("POINT(1.5 -2)")
        );
        assert!(GeometryConverter::decode_point(&bytes[..10]).is_none());
    }

    #[test]
    fn test_integer_bounds() {
        let conv = IntegerConverter;
        assert!(conv
            .to_wire(&SqlValue::Int(255), AbstractType::TinyInt)
            .is_ok());
        assert!(conv
            .to_wire(&SqlValue::Int(256), AbstractType::TinyInt)
            .is_err());
        assert_eq!(
            conv.to_wire(&SqlValue::UInt(u64::MAX), AbstractType::BigInt)
                .unwrap(),
            WireValue::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_set_rejects_commas() {
        let err = SetConverter
            .to_wire(&SqlValue::Set(vec!["a,b".into()]), AbstractType::Set)
            .unwrap_err();
        assert!(err.to_string().contains("commas"));
    }
}
