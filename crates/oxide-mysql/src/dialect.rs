//! The MySQL dialect: one server version bound to its mappers and handlers.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::{BuiltStatement, Param, RawExpression, SqlBuilder};
use crate::capabilities::Capabilities;
use crate::error::Result;
use crate::handlers::{
    AggregateHandler, CapabilityHandler, CteHandler, ExplainFormat, ExplainHandler,
    ExplainOptions, JsonHandler, ReturningHandler,
};
use crate::types::{AbstractType, ColumnParams, TypeMapper};
use crate::value::{quote_literal, UuidStorage, ValueMapper};
use crate::version::ServerVersion;

/// Row count used as the limit when only an offset is requested.
pub const MAX_ROW_COUNT: u64 = u64::MAX;

/// Trait for SQL dialect-specific behavior.
pub trait Dialect {
    /// Returns the name of the dialect.
    fn name(&self) -> &'static str;

    /// Returns the identifier quote character (e.g., `"` for standard SQL, `` ` `` for MySQL).
    fn identifier_quote(&self) -> char {
        '"'
    }

    /// Returns the bind placeholder the driver expects.
    fn parameter_placeholder(&self) -> &'static str {
        "?"
    }

    /// Returns whether the dialect supports RETURNING clause.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Returns whether the dialect supports UPSERT.
    fn supports_upsert(&self) -> bool {
        false
    }

    /// Quotes an identifier, doubling embedded quote characters.
    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }
}

/// Quotes a MySQL identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Splits a dotted name into its segments, unquoting backticked ones.
///
/// A backticked segment may itself contain dots: `` `a.b`.c `` is `["a.b", "c"]`.
#[must_use]
pub fn split_qualified(name: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut segment = String::new();
    let mut quoted = false;
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '`' if quoted && chars.peek() == Some(&'`') => {
                chars.next();
                segment.push('`');
            }
            '`' if quoted => quoted = false,
            '`' if segment.trim().is_empty() => {
                segment.clear();
                quoted = true;
            }
            '.' if !quoted => segments.push(std::mem::take(&mut segment).trim().to_string()),
            c => segment.push(c),
        }
    }
    segments.push(segment.trim().to_string());
    segments
}

/// Quotes a possibly schema-qualified name segment by segment.
#[must_use]
pub fn quote_qualified(name: &str) -> String {
    split_qualified(name)
        .iter()
        .map(|segment| quote_identifier(segment))
        .collect::<Vec<_>>()
        .join(".")
}

/// Bind placeholder expected by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderStyle {
    /// `%s`, with `%%` for a literal percent sign.
    #[default]
    Format,
    /// `?`.
    Qmark,
}

impl PlaceholderStyle {
    /// Returns the placeholder token.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Format => "%s",
            Self::Qmark => "?",
        }
    }
}

/// Per-connection settings that shape the dialect besides the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectOptions {
    /// Driver placeholder.
    pub placeholder_style: PlaceholderStyle,
    /// UUID column representation.
    pub uuid_storage: UuidStorage,
    /// Session time zone offset used for `TIMESTAMP` values.
    pub session_offset: FixedOffset,
}

impl Default for DialectOptions {
    fn default() -> Self {
        Self {
            placeholder_style: PlaceholderStyle::default(),
            uuid_storage: UuidStorage::default(),
            session_offset: Utc.fix(),
        }
    }
}

/// MySQL dialect bound to one server version for its whole lifetime.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    version: ServerVersion,
    options: DialectOptions,
    type_mapper: TypeMapper,
    value_mapper: ValueMapper,
    returning: ReturningHandler,
    json: JsonHandler,
    aggregate: AggregateHandler,
    explain: ExplainHandler,
    cte: CteHandler,
    capabilities: Capabilities,
}

impl MySqlDialect {
    /// Creates a dialect with default options.
    #[must_use]
    pub fn new(version: ServerVersion) -> Self {
        Self::with_options(version, DialectOptions::default())
    }

    /// Creates a dialect, resolving every version gate once.
    #[must_use]
    pub fn with_options(version: ServerVersion, options: DialectOptions) -> Self {
        Self {
            version,
            options,
            type_mapper: TypeMapper::new(version, options.uuid_storage),
            value_mapper: ValueMapper::new(version, options.uuid_storage, options.session_offset),
            returning: ReturningHandler::new(version),
            json: JsonHandler::new(version),
            aggregate: AggregateHandler::new(version),
            explain: ExplainHandler::new(version),
            cte: CteHandler::new(version),
            capabilities: Capabilities::for_version(version),
        }
    }

    /// The bound server version.
    #[must_use]
    pub const fn version(&self) -> ServerVersion {
        self.version
    }

    /// The options the dialect was built with.
    #[must_use]
    pub const fn options(&self) -> &DialectOptions {
        &self.options
    }

    /// Column DDL mapper.
    #[must_use]
    pub const fn type_mapper(&self) -> &TypeMapper {
        &self.type_mapper
    }

    /// Value converter registry.
    #[must_use]
    pub const fn value_mapper(&self) -> &ValueMapper {
        &self.value_mapper
    }

    /// Value converter registry, for registering custom converters.
    pub fn value_mapper_mut(&mut self) -> &mut ValueMapper {
        &mut self.value_mapper
    }

    /// `RETURNING` handler.
    #[must_use]
    pub const fn returning_handler(&self) -> &ReturningHandler {
        &self.returning
    }

    /// JSON handler.
    #[must_use]
    pub const fn json_handler(&self) -> &JsonHandler {
        &self.json
    }

    /// Window and grouping handler.
    #[must_use]
    pub const fn aggregate_handler(&self) -> &AggregateHandler {
        &self.aggregate
    }

    /// `EXPLAIN` handler.
    #[must_use]
    pub const fn explain_handler(&self) -> &ExplainHandler {
        &self.explain
    }

    /// CTE handler.
    #[must_use]
    pub const fn cte_handler(&self) -> &CteHandler {
        &self.cte
    }

    /// Capability set of the bound version.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Renders the DDL type and modifiers of a column.
    pub fn column_definition(&self, ty: AbstractType, params: &ColumnParams) -> Result<String> {
        self.type_mapper.column_definition(ty, params)
    }

    /// Quotes a string literal.
    #[must_use]
    pub fn quote_string_literal(&self, value: &str) -> String {
        quote_literal(value)
    }

    /// Renders `LIMIT`/`OFFSET`. An offset alone gets the maximum row count as limit.
    #[must_use]
    pub fn format_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!("LIMIT {limit}"),
            (Some(limit), Some(offset)) => format!("LIMIT {limit} OFFSET {offset}"),
            (None, Some(offset)) => format!("LIMIT {MAX_ROW_COUNT} OFFSET {offset}"),
        }
    }

    /// Escapes `%` in a `LIKE` pattern so it survives `%s` placeholder processing.
    #[must_use]
    pub fn format_like_pattern(&self, pattern: &str) -> String {
        match self.options.placeholder_style {
            PlaceholderStyle::Format => pattern.replace('%', "%%"),
            PlaceholderStyle::Qmark => String::from(pattern),
        }
    }

    /// Assembles an `EXPLAIN` statement for `sql`.
    pub fn format_explain(&self, sql: &str, options: &ExplainOptions) -> Result<String> {
        let plan = self.explain.plan(options)?;
        let mut parts = vec![String::from(plan.keyword)];
        if plan.analyze {
            parts.push(String::from("ANALYZE"));
        }
        parts.extend(plan.notes.iter().map(|note| String::from(*note)));
        if let Some(format) = plan.format {
            parts.push(format!("FORMAT={format}"));
        }
        match plan.connection_id {
            Some(id) => parts.push(format!("FOR CONNECTION {id}")),
            None => parts.push(String::from(sql)),
        }
        let statement = parts.join(" ");
        debug!(sql = %statement, "Formatted EXPLAIN");
        Ok(statement)
    }

    /// Wraps a SQL fragment to be spliced by the builder.
    #[must_use]
    pub fn create_expression(&self, sql: impl Into<String>) -> RawExpression {
        RawExpression::new(sql)
    }

    /// Returns a builder for this dialect's placeholder.
    #[must_use]
    pub fn builder(&self) -> SqlBuilder {
        SqlBuilder::new(self)
    }

    /// Rewrites a `%s` template into the final statement and bound values.
    pub fn build(&self, template: &str, params: Vec<Param>) -> Result<BuiltStatement> {
        let built = self.builder().build(template, params)?;
        debug!(sql = %built.sql, params = built.params.len(), "Built statement");
        Ok(built)
    }

    /// Returns whether JSON columns and functions exist.
    #[must_use]
    pub fn supports_json(&self) -> bool {
        self.json.is_supported()
    }

    /// Returns whether window functions exist.
    #[must_use]
    pub const fn supports_window_functions(&self) -> bool {
        self.aggregate.supports_window_functions()
    }

    /// Returns whether `EXPLAIN` can produce `format`.
    #[must_use]
    pub fn supports_explain_format(&self, format: ExplainFormat) -> bool {
        self.explain.supports_format(format)
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote(&self) -> char {
        '`'
    }

    fn parameter_placeholder(&self) -> &'static str {
        self.options.placeholder_style.token()
    }

    fn supports_returning(&self) -> bool {
        self.returning.is_supported()
    }

    fn supports_upsert(&self) -> bool {
        // ON DUPLICATE KEY UPDATE
        true
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_identifier(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        let dialect = MySqlDialect::new(ServerVersion::DEFAULT);
        assert_eq!(dialect.quote_identifier("users"), "`users`");
        assert_eq!(dialect.quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_quote_qualified() {
        assert_eq!(quote_qualified("users"), "`users`");
        assert_eq!(quote_qualified("shop.items"), "`shop`.`items`");
        assert_eq!(quote_qualified("`shop`.`items`"), "`shop`.`items`");
        assert_eq!(quote_qualified("`shop` . `items`"), "`shop`.`items`");
        assert_eq!(quote_qualified("`a.b`.c"), "`a.b`.`c`");
        assert_eq!(quote_qualified("`odd``name`"), "`odd``name`");
        assert_eq!(quote_qualified("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_quote_string_literal() {
        let dialect = MySqlDialect::new(ServerVersion::DEFAULT);
        assert_eq!(dialect.quote_string_literal("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_limit_offset() {
        let dialect = MySqlDialect::new(ServerVersion::DEFAULT);
        assert_eq!(dialect.format_limit_offset(None, None), "");
        assert_eq!(dialect.format_limit_offset(Some(10), None), "LIMIT 10");
        assert_eq!(
            dialect.format_limit_offset(Some(10), Some(20)),
            "LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            dialect.format_limit_offset(None, Some(5)),
            "LIMIT 18446744073709551615 OFFSET 5"
        );
    }

    #[test]
    fn test_like_pattern() {
        let dialect = MySqlDialect::new(ServerVersion::DEFAULT);
        assert_eq!(dialect.format_like_pattern("50%"), "50%%");
        let qmark = MySqlDialect::with_options(
            ServerVersion::DEFAULT,
            DialectOptions {
                placeholder_style: PlaceholderStyle::Qmark,
                ..DialectOptions::default()
            },
        );
        assert_eq!(qmark.format_like_pattern("50%"), "50%");
        assert_eq!(qmark.parameter_placeholder(), "?");
    }

    #[test]
    fn test_format_explain_assembly() {
        let dialect = MySqlDialect::new(ServerVersion::new(8, 0, 30));
        assert_eq!(
            dialect
                .format_explain("SELECT 1", &ExplainOptions::new())
                .unwrap(),
            "EXPLAIN SELECT 1"
        );
        assert_eq!(
            dialect
                .format_explain(
                    "SELECT 1",
                    &ExplainOptions::new().analyze().format(ExplainFormat::Tree)
                )
                .unwrap(),
            "EXPLAIN ANALYZE FORMAT=TREE SELECT 1"
        );
        assert_eq!(
            dialect
                .format_explain(
                    "SELECT 1",
                    &ExplainOptions::new().verbose().format(ExplainFormat::Json)
                )
                .unwrap(),
            "EXPLAIN /* Note: EXTENDED option is deprecated in MySQL 5.7+ */ FORMAT=JSON SELECT 1"
        );
        assert_eq!(
            dialect
                .format_explain("ignored", &ExplainOptions::new().for_connection(42))
                .unwrap(),
            "EXPLAIN FOR CONNECTION 42"
        );
    }

    #[test]
    fn test_capability_queries() {
        let old = MySqlDialect::new(ServerVersion::new(5, 6, 0));
        assert!(!old.supports_returning());
        assert!(!old.supports_json());
        assert!(!old.supports_window_functions());
        assert!(old.supports_explain_format(ExplainFormat::Json));
        assert!(!old.supports_explain_format(ExplainFormat::Tree));

        let new = MySqlDialect::new(ServerVersion::new(8, 0, 16));
        assert!(!new.supports_returning());
        assert!(new.supports_json());
        assert!(new.supports_window_functions());
        assert!(new.supports_explain_format(ExplainFormat::Tree));
    }

    #[test]
    fn test_build_uses_style() {
        let dialect = MySqlDialect::new(ServerVersion::DEFAULT);
        let built = dialect
            .build(
                "INSERT INTO t (a, b) VALUES (%s, %s)",
                vec![Param::value(1_i64), Param::Raw(dialect.create_expression("NOW()"))],
            )
            .unwrap();
        assert_eq!(built.sql, "INSERT INTO t (a, b) VALUES (%s, NOW())");
        assert_eq!(built.params.len(), 1);
    }
}
