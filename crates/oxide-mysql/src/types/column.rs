//! Column parameters: sizes, precision and the modifiers appended after the type.

use crate::value::quote_literal;

/// Default value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// NULL default.
    Null,
    /// Boolean default, stored as 1/0.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g., `CURRENT_TIMESTAMP`).
    Expression(String),
}

impl DefaultValue {
    /// Returns the SQL representation of the default value.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Boolean(b) => String::from(if *b { "1" } else { "0" }),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => quote_literal(s),
            Self::Expression(expr) => expr.clone(),
        }
    }
}

/// Parameter bag for [`TypeMapper::column_definition`](super::TypeMapper::column_definition).
///
/// Size fields are only read by the types they apply to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnParams {
    /// Length of `CHAR`/`VARCHAR`.
    pub length: Option<u32>,
    /// Precision of `DECIMAL`.
    pub precision: Option<u8>,
    /// Scale of `DECIMAL`.
    pub scale: Option<u8>,
    /// Integer display width (dropped from 8.0.17).
    pub display_width: Option<u8>,
    /// Fractional seconds precision of `TIME`, `DATETIME` and `TIMESTAMP`.
    pub fsp: Option<u8>,
    /// Labels of `ENUM` and `SET`.
    pub values: Vec<String>,
    /// Spatial reference system of spatial columns.
    pub srid: Option<u32>,
    /// `UNSIGNED` attribute of numeric columns.
    pub unsigned: bool,
    /// Character set of text columns.
    pub charset: Option<String>,
    /// Type name used by [`AbstractType::Custom`](super::AbstractType::Custom).
    pub custom_type: Option<String>,
    /// `NOT NULL` modifier.
    pub not_null: bool,
    /// `DEFAULT` modifier.
    pub default: Option<DefaultValue>,
    /// `AUTO_INCREMENT` modifier.
    pub auto_increment: bool,
    /// `PRIMARY KEY` modifier.
    pub primary_key: bool,
    /// `UNIQUE` modifier.
    pub unique: bool,
    /// `CHECK (...)` expression.
    pub check: Option<String>,
    /// `COLLATE` modifier.
    pub collate: Option<String>,
}

impl ColumnParams {
    /// Creates an empty parameter bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the string length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets decimal precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Sets the integer display width.
    #[must_use]
    pub fn display_width(mut self, width: u8) -> Self {
        self.display_width = Some(width);
        self
    }

    /// Sets fractional seconds precision.
    #[must_use]
    pub fn fsp(mut self, fsp: u8) -> Self {
        self.fsp = Some(fsp);
        self
    }

    /// Sets `ENUM`/`SET` labels.
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the spatial reference system.
    #[must_use]
    pub fn srid(mut self, srid: u32) -> Self {
        self.srid = Some(srid);
        self
    }

    /// Marks a numeric column `UNSIGNED`.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets the character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sets the type name of a custom column.
    #[must_use]
    pub fn custom_type(mut self, name: impl Into<String>) -> Self {
        self.custom_type = Some(name.into());
        self
    }

    /// Adds `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Adds `DEFAULT`.
    #[must_use]
    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Adds `AUTO_INCREMENT`.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Adds `PRIMARY KEY`.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Adds `UNIQUE`.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds `CHECK (expr)`.
    #[must_use]
    pub fn check(mut self, expr: impl Into<String>) -> Self {
        self.check = Some(expr.into());
        self
    }

    /// Adds `COLLATE`.
    #[must_use]
    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collate = Some(collation.into());
        self
    }
}
