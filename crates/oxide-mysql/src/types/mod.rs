//! Abstract column types and their MySQL DDL rendering.

mod column;
mod mapper;

pub use column::{ColumnParams, DefaultValue};
pub use mapper::{FormatFn, TypeFeatures, TypeMapper, TypeMapping};

use std::fmt;

/// Engine-independent column type tag.
///
/// Carries no data; lengths, precision and modifiers travel in [`ColumnParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AbstractType {
    /// 1-byte integer.
    TinyInt,
    /// 2-byte integer.
    SmallInt,
    /// 4-byte integer.
    Integer,
    /// 8-byte integer.
    BigInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Exact numeric with precision and scale.
    Decimal,
    /// Fixed-length string.
    Char,
    /// Variable-length string.
    Varchar,
    /// Unbounded text.
    Text,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time without zone.
    DateTime,
    /// Date and time stored in UTC.
    Timestamp,
    /// Binary large object.
    Blob,
    /// Boolean flag.
    Boolean,
    /// UUID.
    Uuid,
    /// JSON document.
    Json,
    /// Array, stored as a JSON document.
    Array,
    /// One label out of a fixed list.
    Enum,
    /// Any subset of a fixed list.
    Set,
    /// Any spatial value.
    Geometry,
    /// Spatial point.
    Point,
    /// Spatial line string.
    LineString,
    /// Spatial polygon.
    Polygon,
    /// Caller-defined type name.
    Custom,
}

impl AbstractType {
    /// All abstract types.
    pub const ALL: [Self; 26] = [
        Self::TinyInt,
        Self::SmallInt,
        Self::Integer,
        Self::BigInt,
        Self::Float,
        Self::Double,
        Self::Decimal,
        Self::Char,
        Self::Varchar,
        Self::Text,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::Timestamp,
        Self::Blob,
        Self::Boolean,
        Self::Uuid,
        Self::Json,
        Self::Array,
        Self::Enum,
        Self::Set,
        Self::Geometry,
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::Custom,
    ];

    /// Returns the canonical name of the tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Integer => "INTEGER",
            Self::BigInt => "BIGINT",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Char => "CHAR",
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::DateTime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Blob => "BLOB",
            Self::Boolean => "BOOLEAN",
            Self::Uuid => "UUID",
            Self::Json => "JSON",
            Self::Array => "ARRAY",
            Self::Enum => "ENUM",
            Self::Set => "SET",
            Self::Geometry => "GEOMETRY",
            Self::Point => "POINT",
            Self::LineString => "LINESTRING",
            Self::Polygon => "POLYGON",
            Self::Custom => "CUSTOM",
        }
    }

    /// Returns whether the type is an integer type that accepts a display width.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt
        )
    }

    /// Returns whether the type is spatial.
    #[must_use]
    pub const fn is_spatial(self) -> bool {
        matches!(
            self,
            Self::Geometry | Self::Point | Self::LineString | Self::Polygon
        )
    }

    /// Maps a server column type name (as reported in result metadata) back to a tag.
    ///
    /// Display widths, `UNSIGNED` and other attributes are ignored. `TINYINT(1)` and
    /// `BOOLEAN` map to [`AbstractType::Boolean`].
    #[must_use]
    pub fn from_native(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        if upper.starts_with("TINYINT(1)") || upper == "BOOLEAN" || upper == "BOOL" {
            return Some(Self::Boolean);
        }
        let base = upper
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        Some(match base {
            "TINYINT" => Self::TinyInt,
            "SMALLINT" => Self::SmallInt,
            "MEDIUMINT" | "INT" | "INTEGER" => Self::Integer,
            "BIGINT" => Self::BigInt,
            "FLOAT" => Self::Float,
            "DOUBLE" | "REAL" => Self::Double,
            "DECIMAL" | "NUMERIC" | "NEWDECIMAL" => Self::Decimal,
            "CHAR" => Self::Char,
            "VARCHAR" => Self::Varchar,
            "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => Self::Text,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::DateTime,
            "TIMESTAMP" => Self::Timestamp,
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT" => {
                Self::Blob
            }
            "JSON" => Self::Json,
            "ENUM" => Self::Enum,
            "SET" => Self::Set,
            "GEOMETRY" => Self::Geometry,
            "POINT" => Self::Point,
            "LINESTRING" => Self::LineString,
            "POLYGON" => Self::Polygon,
            _ => return None,
        })
    }
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_native_basic() {
        assert_eq!(AbstractType::from_native("INT"), Some(AbstractType::Integer));
        assert_eq!(
            AbstractType::from_native("bigint unsigned"),
            Some(AbstractType::BigInt)
        );
        assert_eq!(
            AbstractType::from_native("VARCHAR(255)"),
            Some(AbstractType::Varchar)
        );
        assert_eq!(AbstractType::from_native("longtext"), Some(AbstractType::Text));
    }

    #[test]
    fn test_from_native_boolean() {
        assert_eq!(
            AbstractType::from_native("TINYINT(1)"),
            Some(AbstractType::Boolean)
        );
        assert_eq!(
            AbstractType::from_native("BOOLEAN"),
            Some(AbstractType::Boolean)
        );
        assert_eq!(
            AbstractType::from_native("TINYINT(4)"),
            Some(AbstractType::TinyInt)
        );
    }

    #[test]
    fn test_from_native_unknown() {
        assert_eq!(AbstractType::from_native("YEAR"), None);
    }

    #[test]
    fn test_all_is_complete_and_unique() {
        let mut names: Vec<&str> = AbstractType::ALL.iter().map(|t| t.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), AbstractType::ALL.len());
    }
}
