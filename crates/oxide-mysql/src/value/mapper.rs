//! Registry of value converters keyed by abstract type.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::FixedOffset;
use tracing::trace;

use super::converters::{
    BlobConverter, BooleanConverter, DateConverter, DateTimeConverter, DecimalConverter,
    EnumConverter, FloatConverter, GeometryConverter, IntegerConverter, JsonConverter,
    SetConverter, TextConverter, TimeConverter, UuidConverter,
};
use super::{DateTimeStyle, SqlValue, UuidStorage, ValueConverter, WireValue};
use crate::error::{Direction, Result, TypeConversionError};
use crate::transport::ColumnMeta;
use crate::types::AbstractType;
use crate::version::{ServerVersion, VersionGate};

const V8_0_0: ServerVersion = ServerVersion::new(8, 0, 0);

const DATETIME_STYLE: VersionGate<DateTimeStyle> =
    VersionGate::new(DateTimeStyle::Legacy, &[(V8_0_0, DateTimeStyle::Iso)]);

/// Converts values between the host and the wire for one server version.
///
/// NULL passes through in both directions without touching a converter.
#[derive(Debug, Clone)]
pub struct ValueMapper {
    version: ServerVersion,
    session_offset: FixedOffset,
    converters: HashMap<AbstractType, Arc<dyn ValueConverter>>,
}

impl ValueMapper {
    /// Builds the converter registry for `version`.
    #[must_use]
    pub fn new(
        version: ServerVersion,
        uuid_storage: UuidStorage,
        session_offset: FixedOffset,
    ) -> Self {
        let style = DATETIME_STYLE.select(version);
        let integer: Arc<dyn ValueConverter> = Arc::new(IntegerConverter);
        let float: Arc<dyn ValueConverter> = Arc::new(FloatConverter);
        let text: Arc<dyn ValueConverter> = Arc::new(TextConverter);
        let datetime: Arc<dyn ValueConverter> =
            Arc::new(DateTimeConverter::new(style, session_offset));
        let json: Arc<dyn ValueConverter> = Arc::new(JsonConverter);
        let geometry: Arc<dyn ValueConverter> = Arc::new(GeometryConverter);

        let mut converters = HashMap::new();
        for ty in AbstractType::ALL {
            let converter: Arc<dyn ValueConverter> = match ty {
                AbstractType::TinyInt
                | AbstractType::SmallInt
                | AbstractType::Integer
                | AbstractType::BigInt => Arc::clone(&integer),
                AbstractType::Float | AbstractType::Double => Arc::clone(&float),
                AbstractType::Decimal => Arc::new(DecimalConverter),
                AbstractType::Char
                | AbstractType::Varchar
                | AbstractType::Text
                | AbstractType::Custom => Arc::clone(&text),
                AbstractType::Date => Arc::new(DateConverter),
                AbstractType::Time => Arc::new(TimeConverter::new(style)),
                AbstractType::DateTime | AbstractType::Timestamp => Arc::clone(&datetime),
                AbstractType::Blob => Arc::new(BlobConverter),
                AbstractType::Boolean => Arc::new(BooleanConverter),
                AbstractType::Uuid => Arc::new(UuidConverter::new(uuid_storage)),
                AbstractType::Json | AbstractType::Array => Arc::clone(&json),
                AbstractType::Enum => Arc::new(EnumConverter),
                AbstractType::Set => Arc::new(SetConverter),
                AbstractType::Geometry
                | AbstractType::Point
                | AbstractType::LineString
                | AbstractType::Polygon => Arc::clone(&geometry),
            };
            converters.insert(ty, converter);
        }

        Self {
            version,
            session_offset,
            converters,
        }
    }

    /// Returns the version the registry was built for.
    #[must_use]
    pub const fn version(&self) -> ServerVersion {
        self.version
    }

    /// Returns the offset that `TIMESTAMP` values are sent and read in.
    #[must_use]
    pub const fn session_offset(&self) -> FixedOffset {
        self.session_offset
    }

    /// Replaces the converter of `ty`.
    pub fn register(&mut self, ty: AbstractType, converter: Arc<dyn ValueConverter>) {
        self.converters.insert(ty, converter);
    }

    /// Returns the converter registered for `ty`.
    #[must_use]
    pub fn converter(&self, ty: AbstractType) -> Option<&dyn ValueConverter> {
        self.converters.get(&ty).map(|c| &**c)
    }

    /// Converts a host value for sending.
    ///
    /// With no declared type the value's own kind picks the converter.
    pub fn to_wire(&self, value: &SqlValue, declared: Option<AbstractType>) -> Result<WireValue> {
        let Some(ty) = declared.or_else(|| value.kind().default_type()) else {
            return Ok(WireValue::Null);
        };
        if value.is_null() {
            return Ok(WireValue::Null);
        }
        let converter = self.lookup(value, ty, Direction::ToWire)?;
        trace!(ty = %ty, converter = converter.name(), "Converting value to wire");
        Ok(converter.to_wire(value, ty)?)
    }

    /// Converts every host value, pairing each with its declared type if one is given.
    pub fn to_wire_all(
        &self,
        values: &[SqlValue],
        declared: &[AbstractType],
    ) -> Result<Vec<WireValue>> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| self.to_wire(value, declared.get(i).copied()))
            .collect()
    }

    /// Converts a wire value read from a column of type `ty`.
    pub fn from_wire(&self, value: WireValue, ty: AbstractType) -> Result<SqlValue> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        let converter = self.lookup(&value, ty, Direction::FromWire)?;
        trace!(ty = %ty, converter = converter.name(), "Converting value from wire");
        Ok(converter.from_wire(value, ty)?)
    }

    /// Converts a wire value using the column's reported native type.
    ///
    /// Columns with no abstract counterpart (`YEAR`, `BIT(n)` bitmaps and the like) are
    /// passed through shape for shape.
    pub fn decode_column(&self, value: WireValue, column: &ColumnMeta) -> Result<SqlValue> {
        match AbstractType::from_native(&column.type_name) {
            Some(ty) => self.from_wire(value, ty),
            None => self.passthrough(value),
        }
    }

    fn passthrough(&self, value: WireValue) -> Result<SqlValue> {
        Ok(match value {
            WireValue::Null => SqlValue::Null,
            WireValue::Int(n) => SqlValue::Int(n),
            WireValue::UInt(n) => SqlValue::UInt(n),
            WireValue::Float(f) => SqlValue::Float(f),
            WireValue::Text(s) => SqlValue::Text(s),
            WireValue::Bytes(b) => SqlValue::Bytes(b),
            WireValue::Date(d) => SqlValue::Date(d),
            WireValue::Time(t) => SqlValue::Time(t),
            WireValue::DateTime(dt) => SqlValue::DateTime(dt),
            duration @ WireValue::Duration(_) => return self.from_wire(duration, AbstractType::Time),
        })
    }

    fn lookup(
        &self,
        value: &impl std::fmt::Debug,
        ty: AbstractType,
        direction: Direction,
    ) -> std::result::Result<&dyn ValueConverter, TypeConversionError> {
        self.converter(ty)
            .ok_or_else(|| TypeConversionError::new(value, ty, direction, "no converter registered"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeDelta};

    use super::*;
    use crate::error::DialectError;
    use crate::value::Decimal;

    fn mapper(version: ServerVersion) -> ValueMapper {
        ValueMapper::new(version, UuidStorage::Char36, FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn test_null_passes_through() {
        let m = mapper(ServerVersion::DEFAULT);
        assert_eq!(
            m.to_wire(&SqlValue::Null, Some(AbstractType::Integer)).unwrap(),
            WireValue::Null
        );
        assert_eq!(m.to_wire(&SqlValue::Null, None).unwrap(), WireValue::Null);
        assert_eq!(
            m.from_wire(WireValue::Null, AbstractType::Json).unwrap(),
            SqlValue::Null
        );
    }

    #[test]
    fn test_boolean_round_trip() {
        let m = mapper(ServerVersion::DEFAULT);
        let wire = m.to_wire(&SqlValue::Bool(true), None).unwrap();
        assert_eq!(wire, WireValue::Int(1));
        assert_eq!(
            m.from_wire(wire, AbstractType::Boolean).unwrap(),
            SqlValue::Bool(true)
        );
        assert_eq!(
            m.from_wire(WireValue::Int(5), AbstractType::Boolean).unwrap(),
            SqlValue::Bool(true)
        );
    }

    #[test]
    fn test_datetime_style_follows_version() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let old = mapper(ServerVersion::new(5, 7, 44));
        let new = mapper(ServerVersion::new(8, 0, 30));
        assert_eq!(
            old.to_wire(&SqlValue::DateTime(dt), None).unwrap(),
            WireValue::Text("2024-01-02 03:04:05".into())
        );
        assert_eq!(
            new.to_wire(&SqlValue::DateTime(dt), None).unwrap(),
            WireValue::Text("2024-01-02T03:04:05.000000".into())
        );
    }

    #[test]
    fn test_timestamp_shifts_to_session_offset() {
        let m = ValueMapper::new(
            ServerVersion::DEFAULT,
            UuidStorage::Char36,
            FixedOffset::east_opt(3600).unwrap(),
        );
        let ts = chrono::DateTime::parse_from_rfc3339("2024-06-01T12:00:00+00:00").unwrap();
        let wire = m.to_wire(&SqlValue::Timestamp(ts), None).unwrap();
        assert_eq!(wire, WireValue::Text("2024-06-01T13:00:00.000000".into()));
        assert_eq!(
            m.from_wire(wire, AbstractType::Timestamp).unwrap(),
            SqlValue::Timestamp(ts)
        );
    }

    #[test]
    fn test_time_duration_is_clamped() {
        let m = mapper(ServerVersion::DEFAULT);
        assert_eq!(
            m.from_wire(WireValue::Duration(TimeDelta::hours(-1)), AbstractType::Time)
                .unwrap(),
            SqlValue::Time(NaiveTime::MIN)
        );
        assert_eq!(
            m.from_wire(WireValue::Text("838:59:59".into()), AbstractType::Time)
                .unwrap(),
            SqlValue::Time(NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap())
        );
    }

    #[test]
    fn test_decimal_sent_as_text() {
        let m = mapper(ServerVersion::DEFAULT);
        let d: Decimal = "12345678901234567890.123456789".parse().unwrap();
        let wire = m.to_wire(&SqlValue::Decimal(d.clone()), None).unwrap();
        assert_eq!(wire, WireValue::Text("12345678901234567890.123456789".into()));
        assert_eq!(
            m.from_wire(wire, AbstractType::Decimal).unwrap(),
            SqlValue::Decimal(d)
        );
    }

    #[test]
    fn test_uuid_storage() {
        let id = uuid::Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let binary = ValueMapper::new(
            ServerVersion::DEFAULT,
            UuidStorage::Binary16,
            FixedOffset::east_opt(0).unwrap(),
        );
        let wire = binary.to_wire(&SqlValue::Uuid(id), None).unwrap();
        assert_eq!(wire, WireValue::Bytes(id.as_bytes().to_vec()));
        assert_eq!(
            binary.from_wire(wire, AbstractType::Uuid).unwrap(),
            SqlValue::Uuid(id)
        );
    }

    #[test]
    fn test_conversion_failure_is_typed() {
        let m = mapper(ServerVersion::DEFAULT);
        let err = m
            .to_wire(&SqlValue::Text("abc".into()), Some(AbstractType::Integer))
            .unwrap_err();
        assert!(matches!(err, DialectError::Conversion(_)));
    }

    #[test]
    fn test_decode_column_unknown_type_passes_through() {
        let m = mapper(ServerVersion::DEFAULT);
        let column = ColumnMeta::new("y", "YEAR");
        assert_eq!(
            m.decode_column(WireValue::Int(2024), &column).unwrap(),
            SqlValue::Int(2024)
        );
        let flag = ColumnMeta::new("f", "TINYINT(1)");
        assert_eq!(
            m.decode_column(WireValue::Int(0), &flag).unwrap(),
            SqlValue::Bool(false)
        );
    }
}
