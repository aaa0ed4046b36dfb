//! Placeholder rewriting with raw expression splicing.
//!
//! Templates always use `%s` for a parameter and `%%` for a literal percent sign. The
//! builder walks the template once and, for each `%s`, either splices the matching
//! [`RawExpression`] into the text or emits the dialect's bind placeholder and moves the
//! value to the bound list. Geometry values are bound as well-known text inside
//! `ST_GeomFromText(..)`, since MySQL does not cast text to a geometry column.

use std::fmt;

use crate::dialect::Dialect;
use crate::error::{DialectError, Result};
use crate::value::{SqlValue, ToSqlValue};

/// The placeholder token of statement templates.
pub const TEMPLATE_PLACEHOLDER: &str = "%s";

const GEOMETRY_FROM_TEXT: &str = "ST_GeomFromText";

/// A SQL fragment inserted verbatim instead of being bound.
///
/// **Warning**: the fragment is not escaped. Never build one from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExpression {
    sql: String,
}

impl RawExpression {
    /// Wraps a SQL fragment.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// Returns the text spliced into the statement.
    #[must_use]
    pub fn render(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for RawExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// One entry of a parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Bound as data.
    Value(SqlValue),
    /// Spliced into the statement text.
    Raw(RawExpression),
}

impl Param {
    /// A bound value.
    pub fn value(value: impl ToSqlValue) -> Self {
        Self::Value(value.to_sql_value())
    }

    /// A raw SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(RawExpression::new(sql))
    }
}

impl From<SqlValue> for Param {
    fn from(value: SqlValue) -> Self {
        Self::Value(value)
    }
}

impl From<RawExpression> for Param {
    fn from(expr: RawExpression) -> Self {
        Self::Raw(expr)
    }
}

/// Final statement text and the values to bind, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    /// Statement with driver placeholders.
    pub sql: String,
    /// Values for the driver placeholders.
    pub params: Vec<SqlValue>,
}

/// Rewrites templates for one dialect's placeholder token.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder {
    placeholder: &'static str,
}

impl SqlBuilder {
    /// Creates a builder emitting `dialect`'s bind placeholder.
    #[must_use]
    pub fn new(dialect: &impl Dialect) -> Self {
        Self {
            placeholder: dialect.parameter_placeholder(),
        }
    }

    /// Returns the placeholder emitted for bound values.
    #[must_use]
    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    /// Builds the final statement.
    ///
    /// Every `%s` consumes one entry of `params`. The number of placeholders must equal
    /// `params.len()`, including when both are zero.
    pub fn build(&self, template: &str, params: Vec<Param>) -> Result<BuiltStatement> {
        let supplied = params.len();
        let mut params = params.into_iter();
        let mut sql = String::with_capacity(template.len());
        let mut bound = Vec::new();
        let mut placeholders = 0_usize;
        // `%%` survives only where the driver itself reads `%s`.
        let literal_percent = if self.placeholder == TEMPLATE_PLACEHOLDER {
            "%%"
        } else {
            "%"
        };

        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                sql.push(c);
                continue;
            }
            match chars.peek() {
                Some('%') => {
                    chars.next();
                    sql.push_str(literal_percent);
                }
                Some('s') => {
                    chars.next();
                    placeholders += 1;
                    match params.next() {
                        Some(Param::Raw(expr)) => sql.push_str(expr.render()),
                        Some(Param::Value(value @ SqlValue::Geometry(_))) => {
                            sql.push_str(GEOMETRY_FROM_TEXT);
                            sql.push('(');
                            sql.push_str(self.placeholder);
                            sql.push(')');
                            bound.push(value);
                        }
                        Some(Param::Value(value)) => {
                            sql.push_str(self.placeholder);
                            bound.push(value);
                        }
                        None => {}
                    }
                }
                _ => sql.push('%'),
            }
        }

        if placeholders != supplied {
            return Err(DialectError::ParameterCountMismatch {
                placeholders,
                supplied,
            });
        }
        Ok(BuiltStatement { sql, params: bound })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{DialectOptions, MySqlDialect, PlaceholderStyle};
    use crate::version::ServerVersion;

    fn builder(style: PlaceholderStyle) -> SqlBuilder {
        let dialect = MySqlDialect::with_options(
            ServerVersion::DEFAULT,
            DialectOptions {
                placeholder_style: style,
                ..DialectOptions::default()
            },
        );
        SqlBuilder::new(&dialect)
    }

    #[test]
    fn test_plain_values() {
        let built = builder(PlaceholderStyle::Format)
            .build(
                "SELECT * FROM t WHERE a = %s AND b = %s",
                vec![Param::value(1_i64), Param::value("x")],
            )
            .unwrap();
        assert_eq!(built.sql, "SELECT * FROM t WHERE a = %s AND b = %s");
        assert_eq!(
            built.params,
            vec![SqlValue::Int(1), SqlValue::Text("x".into())]
        );
    }

    #[test]
    fn test_raw_expression_is_spliced() {
        let built = builder(PlaceholderStyle::Qmark)
            .build(
                "UPDATE t SET n = %s, updated_at = %s WHERE id = %s",
                vec![
                    Param::value(5_i64),
                    Param::raw("NOW()"),
                    Param::value(9_i64),
                ],
            )
            .unwrap();
        assert_eq!(built.sql, "UPDATE t SET n = ?, updated_at = NOW() WHERE id = ?");
        assert_eq!(built.params, vec![SqlValue::Int(5), SqlValue::Int(9)]);
    }

    #[test]
    fn test_geometry_is_bound_through_wkt_parser() {
        let built = builder(PlaceholderStyle::Qmark)
            .build(
                "INSERT INTO places (name, location) VALUES (%s, %s)",
                vec![
                    Param::value("home"),
                    Param::Value(SqlValue::Geometry(String::from("POINT(1 2)"))),
                ],
            )
            .unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO places (name, location) VALUES (?, ST_GeomFromText(?))"
        );
        assert_eq!(
            built.params[1],
            SqlValue::Geometry(String::from("POINT(1 2)"))
        );
    }

    #[test]
    fn test_count_mismatch() {
        let b = builder(PlaceholderStyle::Format);
        let err = b
            .build("SELECT %s, %s", vec![Param::value(1_i64)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter count mismatch: SQL needs 2 parameters but 1 were provided"
        );
        assert!(b
            .build("SELECT %s", vec![Param::value(1_i64), Param::value(2_i64)])
            .is_err());
        assert!(b.build("SELECT %s", vec![]).is_err());
    }

    #[test]
    fn test_percent_escapes() {
        let built = builder(PlaceholderStyle::Format)
            .build("SELECT * FROM t WHERE name LIKE '%%a' AND x = %s", vec![Param::value(1_i64)])
            .unwrap();
        assert_eq!(built.sql, "SELECT * FROM t WHERE name LIKE '%%a' AND x = %s");
        let built = builder(PlaceholderStyle::Qmark)
            .build("SELECT * FROM t WHERE name LIKE '%%a' AND x = %s", vec![Param::value(1_i64)])
            .unwrap();
        assert_eq!(built.sql, "SELECT * FROM t WHERE name LIKE '%a' AND x = ?");
    }

    #[test]
    fn test_no_params() {
        let built = builder(PlaceholderStyle::Format)
            .build("SELECT 1", vec![])
            .unwrap();
        assert_eq!(built.sql, "SELECT 1");
        assert!(built.params.is_empty());
    }
}
