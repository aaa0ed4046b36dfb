//! Host-side and wire-side values.
//!
//! [`SqlValue`] is what callers hand to the adapter and get back from it. [`WireValue`]
//! is what a driver transmits. The [`ValueMapper`] converts between the two, keyed by
//! [`AbstractType`](crate::types::AbstractType).

mod converters;
mod decimal;
mod mapper;

pub use converters::{DateTimeStyle, UuidStorage, ValueConverter};
pub use decimal::{Decimal, ParseDecimalError};
pub use mapper::ValueMapper;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use uuid::Uuid;

use crate::types::AbstractType;

/// A value on the caller's side of the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Unsigned integer value (`BIGINT UNSIGNED` can exceed `i64`).
    UInt(u64),
    /// Float value.
    Float(f64),
    /// Exact decimal value.
    Decimal(Decimal),
    /// Text value.
    Text(String),
    /// Binary value.
    Bytes(Vec<u8>),
    /// UUID value.
    Uuid(Uuid),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without a time zone (`DATETIME`).
    DateTime(NaiveDateTime),
    /// Date and time with an offset (`TIMESTAMP`).
    Timestamp(DateTime<FixedOffset>),
    /// Structured JSON document.
    Json(serde_json::Value),
    /// `ENUM` label.
    Enum(String),
    /// `SET` members.
    Set(Vec<String>),
    /// Spatial value as well-known text.
    Geometry(String),
}

/// Closed tag of a [`SqlValue`]'s runtime shape, used to pick a converter when the
/// caller gives no column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`SqlValue::Null`].
    Null,
    /// [`SqlValue::Bool`].
    Bool,
    /// [`SqlValue::Int`].
    Int,
    /// [`SqlValue::UInt`].
    UInt,
    /// [`SqlValue::Float`].
    Float,
    /// [`SqlValue::Decimal`].
    Decimal,
    /// [`SqlValue::Text`].
    Text,
    /// [`SqlValue::Bytes`].
    Bytes,
    /// [`SqlValue::Uuid`].
    Uuid,
    /// [`SqlValue::Date`].
    Date,
    /// [`SqlValue::Time`].
    Time,
    /// [`SqlValue::DateTime`].
    DateTime,
    /// [`SqlValue::Timestamp`].
    Timestamp,
    /// [`SqlValue::Json`].
    Json,
    /// [`SqlValue::Enum`].
    Enum,
    /// [`SqlValue::Set`].
    Set,
    /// [`SqlValue::Geometry`].
    Geometry,
}

impl ValueKind {
    /// The column type a value of this kind is converted as when none is declared.
    #[must_use]
    pub const fn default_type(self) -> Option<AbstractType> {
        Some(match self {
            Self::Null => return None,
            Self::Bool => AbstractType::Boolean,
            Self::Int | Self::UInt => AbstractType::BigInt,
            Self::Float => AbstractType::Double,
            Self::Decimal => AbstractType::Decimal,
            Self::Text => AbstractType::Text,
            Self::Bytes => AbstractType::Blob,
            Self::Uuid => AbstractType::Uuid,
            Self::Date => AbstractType::Date,
            Self::Time => AbstractType::Time,
            Self::DateTime => AbstractType::DateTime,
            Self::Timestamp => AbstractType::Timestamp,
            Self::Json => AbstractType::Json,
            Self::Enum => AbstractType::Enum,
            Self::Set => AbstractType::Set,
            Self::Geometry => AbstractType::Geometry,
        })
    }
}

impl SqlValue {
    /// Returns the runtime kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::UInt(_) => ValueKind::UInt,
            Self::Float(_) => ValueKind::Float,
            Self::Decimal(_) => ValueKind::Decimal,
            Self::Text(_) => ValueKind::Text,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Uuid(_) => ValueKind::Uuid,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Json(_) => ValueKind::Json,
            Self::Enum(_) => ValueKind::Enum,
            Self::Set(_) => ValueKind::Set,
            Self::Geometry(_) => ValueKind::Geometry,
        }
    }

    /// Returns whether this is [`SqlValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Quotes a string literal for MySQL: `'` is doubled, `\` is escaped.
#[must_use]
pub fn quote_literal(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('\'', "''");
    format!("'{escaped}'")
}

/// A value as transmitted to or received from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// NULL value.
    Null,
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Text, also used for DECIMAL, JSON and temporal literals.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Date decoded by the driver.
    Date(NaiveDate),
    /// Time of day decoded by the driver.
    Time(NaiveTime),
    /// Datetime decoded by the driver.
    DateTime(NaiveDateTime),
    /// A `TIME` column decoded as a signed duration (can be negative or exceed 24h).
    Duration(TimeDelta),
}

impl WireValue {
    /// Returns whether this is [`WireValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

macro_rules! impl_to_sql_value {
    ($($ty:ty => $variant:ident via $conv:expr),* $(,)?) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::$variant($conv(self))
                }
            }
        )*
    };
}

impl_to_sql_value! {
    bool => Bool via std::convert::identity,
    i64 => Int via std::convert::identity,
    i32 => Int via i64::from,
    i16 => Int via i64::from,
    i8 => Int via i64::from,
    u64 => UInt via std::convert::identity,
    u32 => UInt via u64::from,
    u16 => UInt via u64::from,
    u8 => UInt via u64::from,
    f64 => Float via std::convert::identity,
    f32 => Float via f64::from,
    String => Text via std::convert::identity,
    Vec<u8> => Bytes via std::convert::identity,
    Decimal => Decimal via std::convert::identity,
    Uuid => Uuid via std::convert::identity,
    NaiveDate => Date via std::convert::identity,
    NaiveTime => Time via std::convert::identity,
    NaiveDateTime => DateTime via std::convert::identity,
    DateTime<FixedOffset> => Timestamp via std::convert::identity,
    serde_json::Value => Json via std::convert::identity,
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for &[u8] {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bytes(self.to_vec())
    }
}

impl ToSqlValue for DateTime<chrono::Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Timestamp(self.fixed_offset())
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal_escaping() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"C:\tmp"), r"'C:\\tmp'");
        assert_eq!(
            quote_literal("'; DROP TABLE users; --"),
            "'''; DROP TABLE users; --'"
        );
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(7_u8.to_sql_value(), SqlValue::UInt(7));
        assert_eq!("x".to_sql_value(), SqlValue::Text(String::from("x")));
        assert_eq!(None::<i64>.to_sql_value(), SqlValue::Null);
        assert_eq!(
            serde_json::json!({"a": 1}).to_sql_value(),
            SqlValue::Json(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn test_kind_default_types() {
        assert_eq!(SqlValue::Bool(true).kind().default_type(), Some(AbstractType::Boolean));
        assert_eq!(SqlValue::Null.kind().default_type(), None);
        assert_eq!(
            SqlValue::Uuid(Uuid::nil()).kind().default_type(),
            Some(AbstractType::Uuid)
        );
    }
}
