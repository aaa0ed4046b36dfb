//! Abstract type to MySQL column DDL.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{AbstractType, ColumnParams};
use crate::error::{DialectError, Result};
use crate::value::{quote_literal, UuidStorage};
use crate::version::{ServerVersion, VersionGate};

const V5_6_4: ServerVersion = ServerVersion::new(5, 6, 4);
const V5_7_8: ServerVersion = ServerVersion::new(5, 7, 8);
const V8_0_3: ServerVersion = ServerVersion::new(8, 0, 3);
const V8_0_16: ServerVersion = ServerVersion::new(8, 0, 16);
const V8_0_17: ServerVersion = ServerVersion::new(8, 0, 17);

const NATIVE_JSON: VersionGate<bool> = VersionGate::since(&[(V5_7_8, true)]);
const FRACTIONAL_SECONDS: VersionGate<bool> = VersionGate::since(&[(V5_6_4, true)]);
const SPATIAL_SRID: VersionGate<bool> = VersionGate::since(&[(V8_0_3, true)]);
const CHECK_CONSTRAINTS: VersionGate<bool> = VersionGate::since(&[(V8_0_16, true)]);
// Integer display widths are deprecated and no longer rendered from 8.0.17.
const DISPLAY_WIDTH: VersionGate<bool> = VersionGate::new(true, &[(V8_0_17, false)]);

const MAX_DECIMAL_PRECISION: u8 = 65;
const MAX_DECIMAL_SCALE: u8 = 30;
const MAX_FSP: u8 = 6;
const MAX_CHAR_LENGTH: u32 = 255;
const MAX_VARCHAR_LENGTH: u32 = 65_535;

/// DDL features resolved from the server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeFeatures {
    /// `JSON` is a native column type.
    pub native_json: bool,
    /// `TIME(n)`/`DATETIME(n)`/`TIMESTAMP(n)` are accepted.
    pub fractional_seconds: bool,
    /// Spatial columns accept an `SRID` attribute.
    pub spatial_srid: bool,
    /// `CHECK` constraints are enforced.
    pub check_constraints: bool,
    /// Integer display widths are rendered.
    pub display_width: bool,
}

impl TypeFeatures {
    /// Resolves the features of `version`.
    #[must_use]
    pub fn for_version(version: ServerVersion) -> Self {
        Self {
            native_json: NATIVE_JSON.select(version),
            fractional_seconds: FRACTIONAL_SECONDS.select(version),
            spatial_srid: SPATIAL_SRID.select(version),
            check_constraints: CHECK_CONSTRAINTS.select(version),
            display_width: DISPLAY_WIDTH.select(version),
        }
    }
}

/// Renders a type name and its parameters; an `Err` carries the reason.
pub type FormatFn =
    fn(&str, &ColumnParams, &TypeFeatures) -> std::result::Result<String, String>;

/// How one abstract type is spelled in MySQL DDL.
#[derive(Debug, Clone, Copy)]
pub struct TypeMapping {
    /// Engine type name.
    pub type_name: &'static str,
    /// Optional formatter applying lengths, precision and attributes.
    pub format: Option<FormatFn>,
}

impl TypeMapping {
    const fn plain(type_name: &'static str) -> Self {
        Self {
            type_name,
            format: None,
        }
    }

    const fn formatted(type_name: &'static str, format: FormatFn) -> Self {
        Self {
            type_name,
            format: Some(format),
        }
    }

    /// Renders the type portion of a column definition.
    pub fn render(
        &self,
        params: &ColumnParams,
        features: &TypeFeatures,
    ) -> std::result::Result<String, String> {
        match self.format {
            Some(format) => format(self.type_name, params, features),
            None => Ok(self.type_name.to_string()),
        }
    }
}

/// Maps abstract column types to MySQL column definitions for one server version.
///
/// The mapping table is built once; [`column_definition`](Self::column_definition) is
/// a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct TypeMapper {
    version: ServerVersion,
    features: TypeFeatures,
    mappings: BTreeMap<AbstractType, TypeMapping>,
}

impl TypeMapper {
    /// Creates a mapper for `version`.
    #[must_use]
    pub fn new(version: ServerVersion, uuid_storage: UuidStorage) -> Self {
        let features = TypeFeatures::for_version(version);
        let mappings = AbstractType::ALL
            .iter()
            .map(|ty| (*ty, base_mapping(*ty, &features, uuid_storage)))
            .collect();
        Self {
            version,
            features,
            mappings,
        }
    }

    /// Returns the bound server version.
    #[must_use]
    pub const fn version(&self) -> ServerVersion {
        self.version
    }

    /// Returns the resolved DDL features.
    #[must_use]
    pub const fn features(&self) -> &TypeFeatures {
        &self.features
    }

    /// Returns the mapping of `ty`, if any.
    #[must_use]
    pub fn mapping(&self, ty: AbstractType) -> Option<&TypeMapping> {
        self.mappings.get(&ty)
    }

    /// Renders a full column definition (type, attributes and modifiers).
    ///
    /// Modifiers are appended in a fixed order: `NOT NULL`, `DEFAULT`,
    /// `AUTO_INCREMENT`, `PRIMARY KEY`, `UNIQUE`, `CHECK`, `COLLATE`.
    pub fn column_definition(&self, ty: AbstractType, params: &ColumnParams) -> Result<String> {
        let unsupported = |reason: String| DialectError::UnsupportedType {
            ty,
            version: self.version,
            reason,
        };
        let mapping = self
            .mapping(ty)
            .ok_or_else(|| unsupported(String::from("no mapping for this version")))?;
        let mut sql = mapping.render(params, &self.features).map_err(unsupported)?;

        if params.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &params.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        if params.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if params.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if params.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(check) = &params.check {
            if self.features.check_constraints {
                sql.push_str(" CHECK (");
                sql.push_str(check);
                sql.push(')');
            } else {
                warn!(
                    version = %self.version,
                    check = %check,
                    "CHECK constraints are parsed but ignored before MySQL 8.0.16, omitting"
                );
            }
        }
        if let Some(collation) = &params.collate {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }

        debug!(ty = %ty, sql = %sql, "Rendered column definition");
        Ok(sql)
    }
}

fn base_mapping(ty: AbstractType, features: &TypeFeatures, uuid: UuidStorage) -> TypeMapping {
    match ty {
        AbstractType::TinyInt => TypeMapping::formatted("TINYINT", format_integer),
        AbstractType::SmallInt => TypeMapping::formatted("SMALLINT", format_integer),
        AbstractType::Integer => TypeMapping::formatted("INT", format_integer),
        AbstractType::BigInt => TypeMapping::formatted("BIGINT", format_integer),
        AbstractType::Float => TypeMapping::formatted("FLOAT", format_unsigned),
        AbstractType::Double => TypeMapping::formatted("DOUBLE", format_unsigned),
        AbstractType::Decimal => TypeMapping::formatted("DECIMAL", format_decimal),
        AbstractType::Char => TypeMapping::formatted("CHAR", format_char),
        AbstractType::Varchar => TypeMapping::formatted("VARCHAR", format_varchar),
        AbstractType::Text => TypeMapping::formatted("TEXT", format_charset),
        AbstractType::Date => TypeMapping::plain("DATE"),
        AbstractType::Time => TypeMapping::formatted("TIME", format_temporal),
        AbstractType::DateTime => TypeMapping::formatted("DATETIME", format_temporal),
        AbstractType::Timestamp => TypeMapping::formatted("TIMESTAMP", format_temporal),
        AbstractType::Blob => TypeMapping::plain("BLOB"),
        AbstractType::Boolean => TypeMapping::plain("TINYINT(1)"),
        AbstractType::Uuid => match uuid {
            UuidStorage::Char36 => TypeMapping::plain("CHAR(36)"),
            UuidStorage::Binary16 => TypeMapping::plain("BINARY(16)"),
        },
        AbstractType::Json | AbstractType::Array => {
            if features.native_json {
                TypeMapping::plain("JSON")
            } else {
                TypeMapping::formatted("LONGTEXT", format_charset)
            }
        }
        AbstractType::Enum => TypeMapping::formatted("ENUM", format_labels),
        AbstractType::Set => TypeMapping::formatted("SET", format_labels),
        AbstractType::Geometry => TypeMapping::formatted("GEOMETRY", format_spatial),
        AbstractType::Point => TypeMapping::formatted("POINT", format_spatial),
        AbstractType::LineString => TypeMapping::formatted("LINESTRING", format_spatial),
        AbstractType::Polygon => TypeMapping::formatted("POLYGON", format_spatial),
        AbstractType::Custom => TypeMapping::formatted("TEXT", format_custom),
    }
}

fn push_unsigned(sql: &mut String, params: &ColumnParams) {
    if params.unsigned {
        sql.push_str(" UNSIGNED");
    }
}

fn push_charset(sql: &mut String, params: &ColumnParams) {
    if let Some(charset) = &params.charset {
        sql.push_str(" CHARACTER SET ");
        sql.push_str(charset);
    }
}

fn format_integer(
    name: &str,
    params: &ColumnParams,
    features: &TypeFeatures,
) -> std::result::Result<String, String> {
    let mut sql = name.to_string();
    if let Some(width) = params.display_width {
        if features.display_width {
            sql = format!("{name}({width})");
        } else {
            debug!(
                width,
                "Integer display width is deprecated from MySQL 8.0.17, omitting"
            );
        }
    }
    push_unsigned(&mut sql, params);
    Ok(sql)
}

fn format_unsigned(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    let mut sql = name.to_string();
    push_unsigned(&mut sql, params);
    Ok(sql)
}

fn format_decimal(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    let precision = params.precision.unwrap_or(10);
    let scale = params.scale.unwrap_or(0);
    if precision == 0 || precision > MAX_DECIMAL_PRECISION {
        return Err(format!(
            "precision must be between 1 and {MAX_DECIMAL_PRECISION}, got {precision}"
        ));
    }
    if scale > MAX_DECIMAL_SCALE || scale > precision {
        return Err(format!(
            "scale must be at most {MAX_DECIMAL_SCALE} and not exceed precision {precision}, got {scale}"
        ));
    }
    let mut sql = format!("{name}({precision},{scale})");
    push_unsigned(&mut sql, params);
    Ok(sql)
}

fn format_char(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    let length = params.length.unwrap_or(1);
    if length > MAX_CHAR_LENGTH {
        return Err(format!(
            "CHAR length must be at most {MAX_CHAR_LENGTH}, got {length}"
        ));
    }
    let mut sql = format!("{name}({length})");
    push_charset(&mut sql, params);
    Ok(sql)
}

fn format_varchar(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    let length = params
        .length
        .ok_or_else(|| String::from("VARCHAR requires a length"))?;
    if length == 0 || length > MAX_VARCHAR_LENGTH {
        return Err(format!(
            "VARCHAR length must be between 1 and {MAX_VARCHAR_LENGTH}, got {length}"
        ));
    }
    let mut sql = format!("{name}({length})");
    push_charset(&mut sql, params);
    Ok(sql)
}

fn format_charset(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    let mut sql = name.to_string();
    push_charset(&mut sql, params);
    Ok(sql)
}

fn format_temporal(
    name: &str,
    params: &ColumnParams,
    features: &TypeFeatures,
) -> std::result::Result<String, String> {
    match params.fsp {
        Some(fsp) if fsp > MAX_FSP => Err(format!(
            "fractional seconds precision must be at most {MAX_FSP}, got {fsp}"
        )),
        Some(fsp) if features.fractional_seconds => Ok(format!("{name}({fsp})")),
        Some(fsp) => {
            warn!(
                fsp,
                "Fractional seconds require MySQL 5.6.4, omitting precision"
            );
            Ok(name.to_string())
        }
        None => Ok(name.to_string()),
    }
}

fn format_labels(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    if params.values.is_empty() {
        return Err(format!("{name} requires at least one value"));
    }
    let labels: Vec<String> = params.values.iter().map(|v| quote_literal(v)).collect();
    let mut sql = format!("{name}({})", labels.join(","));
    push_charset(&mut sql, params);
    Ok(sql)
}

fn format_spatial(
    name: &str,
    params: &ColumnParams,
    features: &TypeFeatures,
) -> std::result::Result<String, String> {
    let mut sql = name.to_string();
    if let Some(srid) = params.srid {
        if features.spatial_srid {
            sql.push_str(&format!(" SRID {srid}"));
        } else {
            warn!(srid, "SRID column attribute requires MySQL 8.0.3, omitting");
        }
    }
    Ok(sql)
}

fn format_custom(
    name: &str,
    params: &ColumnParams,
    _: &TypeFeatures,
) -> std::result::Result<String, String> {
    Ok(params
        .custom_type
        .clone()
        .unwrap_or_else(|| name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DefaultValue;

    fn mapper(major: u16, minor: u16, patch: u16) -> TypeMapper {
        TypeMapper::new(ServerVersion::new(major, minor, patch), UuidStorage::Char36)
    }

    #[test]
    fn test_every_type_has_one_mapping() {
        let m = mapper(8, 0, 0);
        for ty in AbstractType::ALL {
            assert!(m.mapping(ty).is_some(), "missing mapping for {ty}");
        }
    }

    #[test]
    fn test_boolean_is_tinyint_one() {
        let sql = mapper(8, 0, 0)
            .column_definition(AbstractType::Boolean, &ColumnParams::new())
            .unwrap();
        assert_eq!(sql, "TINYINT(1)");
    }

    #[test]
    fn test_json_falls_back_to_longtext() {
        let params = ColumnParams::new();
        assert_eq!(
            mapper(5, 6, 0)
                .column_definition(AbstractType::Json, &params)
                .unwrap(),
            "LONGTEXT"
        );
        assert_eq!(
            mapper(5, 7, 8)
                .column_definition(AbstractType::Json, &params)
                .unwrap(),
            "JSON"
        );
        assert_eq!(
            mapper(5, 7, 7)
                .column_definition(AbstractType::Array, &params)
                .unwrap(),
            "LONGTEXT"
        );
    }

    #[test]
    fn test_display_width_dropped_from_8_0_17() {
        let params = ColumnParams::new().display_width(11).unsigned();
        assert_eq!(
            mapper(5, 7, 30)
                .column_definition(AbstractType::Integer, &params)
                .unwrap(),
            "INT(11) UNSIGNED"
        );
        assert_eq!(
            mapper(8, 0, 17)
                .column_definition(AbstractType::Integer, &params)
                .unwrap(),
            "INT UNSIGNED"
        );
    }

    #[test]
    fn test_check_constraint_gate() {
        let params = ColumnParams::new().check("age >= 0");
        assert_eq!(
            mapper(8, 0, 16)
                .column_definition(AbstractType::Integer, &params)
                .unwrap(),
            "INT CHECK (age >= 0)"
        );
        assert_eq!(
            mapper(8, 0, 15)
                .column_definition(AbstractType::Integer, &params)
                .unwrap(),
            "INT"
        );
    }

    #[test]
    fn test_modifier_order() {
        let params = ColumnParams::new()
            .length(100)
            .collate("utf8mb4_bin")
            .check("name <> ''")
            .unique()
            .primary_key()
            .default_value(DefaultValue::String("x".into()))
            .not_null();
        assert_eq!(
            mapper(8, 0, 30)
                .column_definition(AbstractType::Varchar, &params)
                .unwrap(),
            "VARCHAR(100) NOT NULL DEFAULT 'x' PRIMARY KEY UNIQUE CHECK (name <> '') COLLATE utf8mb4_bin"
        );
    }

    #[test]
    fn test_auto_increment_primary_key() {
        let params = ColumnParams::new().not_null().auto_increment().primary_key();
        assert_eq!(
            mapper(8, 0, 0)
                .column_definition(AbstractType::BigInt, &params)
                .unwrap(),
            "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY"
        );
    }

    #[test]
    fn test_decimal_defaults_and_validation() {
        let m = mapper(8, 0, 0);
        assert_eq!(
            m.column_definition(AbstractType::Decimal, &ColumnParams::new())
                .unwrap(),
            "DECIMAL(10,0)"
        );
        assert_eq!(
            m.column_definition(AbstractType::Decimal, &ColumnParams::new().precision(12, 4))
                .unwrap(),
            "DECIMAL(12,4)"
        );
        assert!(matches!(
            m.column_definition(AbstractType::Decimal, &ColumnParams::new().precision(70, 2)),
            Err(DialectError::UnsupportedType { .. })
        ));
        assert!(m
            .column_definition(AbstractType::Decimal, &ColumnParams::new().precision(5, 6))
            .is_err());
    }

    #[test]
    fn test_varchar_requires_length() {
        let err = mapper(8, 0, 0)
            .column_definition(AbstractType::Varchar, &ColumnParams::new())
            .unwrap_err();
        assert!(err.to_string().contains("VARCHAR requires a length"));
    }

    #[test]
    fn test_temporal_fsp() {
        let params = ColumnParams::new().fsp(6);
        assert_eq!(
            mapper(5, 6, 4)
                .column_definition(AbstractType::DateTime, &params)
                .unwrap(),
            "DATETIME(6)"
        );
        assert_eq!(
            mapper(5, 6, 3)
                .column_definition(AbstractType::DateTime, &params)
                .unwrap(),
            "DATETIME"
        );
        assert!(mapper(8, 0, 0)
            .column_definition(AbstractType::Time, &ColumnParams::new().fsp(7))
            .is_err());
    }

    #[test]
    fn test_enum_and_set_labels() {
        let m = mapper(8, 0, 0);
        assert_eq!(
            m.column_definition(
                AbstractType::Enum,
                &ColumnParams::new().values(["small", "it's big"])
            )
            .unwrap(),
            "ENUM('small','it''s big')"
        );
        assert!(m
            .column_definition(AbstractType::Set, &ColumnParams::new())
            .is_err());
    }

    #[test]
    fn test_spatial_srid_gate() {
        let params = ColumnParams::new().srid(4326).not_null();
        assert_eq!(
            mapper(8, 0, 3)
                .column_definition(AbstractType::Point, &params)
                .unwrap(),
            "POINT SRID 4326 NOT NULL"
        );
        assert_eq!(
            mapper(5, 7, 0)
                .column_definition(AbstractType::Point, &params)
                .unwrap(),
            "POINT NOT NULL"
        );
    }

    #[test]
    fn test_uuid_storage() {
        let binary = TypeMapper::new(ServerVersion::new(8, 0, 0), UuidStorage::Binary16);
        assert_eq!(
            binary
                .column_definition(AbstractType::Uuid, &ColumnParams::new())
                .unwrap(),
            "BINARY(16)"
        );
        assert_eq!(
            mapper(8, 0, 0)
                .column_definition(AbstractType::Uuid, &ColumnParams::new())
                .unwrap(),
            "CHAR(36)"
        );
    }

    #[test]
    fn test_custom_type() {
        let m = mapper(8, 0, 0);
        assert_eq!(
            m.column_definition(AbstractType::Custom, &ColumnParams::new())
                .unwrap(),
            "TEXT"
        );
        assert_eq!(
            m.column_definition(
                AbstractType::Custom,
                &ColumnParams::new().custom_type("MEDIUMTEXT")
            )
            .unwrap(),
            "MEDIUMTEXT"
        );
    }

    #[test]
    fn test_charset_before_modifiers() {
        let params = ColumnParams::new()
            .length(10)
            .charset("utf8mb4")
            .not_null()
            .collate("utf8mb4_unicode_ci");
        assert_eq!(
            mapper(8, 0, 0)
                .column_definition(AbstractType::Char, &params)
                .unwrap(),
            "CHAR(10) CHARACTER SET utf8mb4 NOT NULL COLLATE utf8mb4_unicode_ci"
        );
    }
}
