//! Error types for the MySQL dialect adapter.

use std::fmt;

use crate::transport::{TransportError, TransportErrorKind};
use crate::types::AbstractType;
use crate::version::ServerVersion;

/// Errors produced by the dialect, the mappers, the transaction manager and the backend.
#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    /// No DDL mapping exists for a type, or its parameters are invalid, at this version.
    #[error("Unsupported column type {ty} for MySQL {version}: {reason}")]
    UnsupportedType {
        /// The abstract type that was requested.
        ty: AbstractType,
        /// The version the dialect is bound to.
        version: ServerVersion,
        /// Why the mapping failed.
        reason: String,
    },

    /// A value could not be converted to or from its wire representation.
    #[error(transparent)]
    Conversion(#[from] TypeConversionError),

    /// A feature is unavailable, either at all or at the bound version.
    #[error(transparent)]
    NotSupported(#[from] NotSupportedError),

    /// The number of placeholders and supplied parameters differ.
    #[error(
        "Parameter count mismatch: SQL needs {placeholders} parameters but {supplied} were provided"
    )]
    ParameterCountMismatch {
        /// Placeholders found in the template.
        placeholders: usize,
        /// Parameters supplied by the caller.
        supplied: usize,
    },

    /// Invalid transaction state transition or savepoint reference.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Attempted to change the isolation level while a transaction is active.
    #[error("Isolation level error: {0}")]
    IsolationLevel(String),

    /// A server version string could not be parsed.
    #[error("Invalid server version string '{0}'")]
    InvalidVersion(String),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The connection to the server failed or was lost.
    #[error("Connection error: {0}")]
    Connection(#[source] TransportError),

    /// A constraint (unique, foreign key, not null) was violated.
    #[error("Integrity error: {0}")]
    Integrity(#[source] TransportError),

    /// The server aborted the statement because of a deadlock or lock wait timeout.
    #[error("Deadlock detected: {0}")]
    Deadlock(#[source] TransportError),

    /// The statement referenced unknown schema objects.
    #[error("Operational error: {0}")]
    Operational(#[source] TransportError),

    /// Any other server-side failure.
    #[error("Query error: {0}")]
    Query(#[source] TransportError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for dialect operations.
pub type Result<T> = std::result::Result<T, DialectError>;

// MySQL server error numbers grouped by how callers usually react to them.
const INTEGRITY_ERRNOS: &[u16] = &[1048, 1062, 1451, 1452];
const DEADLOCK_ERRNOS: &[u16] = &[1205, 1213];
const OPERATIONAL_ERRNOS: &[u16] = &[1054, 1146];
const CONNECTION_ERRNOS: &[u16] = &[2002, 2003, 2006, 2013];

impl From<TransportError> for DialectError {
    fn from(err: TransportError) -> Self {
        if err.kind == TransportErrorKind::Connection {
            return Self::Connection(err);
        }
        match err.code {
            Some(code) if INTEGRITY_ERRNOS.contains(&code) => Self::Integrity(err),
            Some(code) if DEADLOCK_ERRNOS.contains(&code) => Self::Deadlock(err),
            Some(code) if OPERATIONAL_ERRNOS.contains(&code) => Self::Operational(err),
            Some(code) if CONNECTION_ERRNOS.contains(&code) => Self::Connection(err),
            _ => Self::Query(err),
        }
    }
}

/// A feature that a capability handler can refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `RETURNING` clauses.
    Returning,
    /// JSON columns, functions and operators.
    Json,
    /// Window functions and frame clauses.
    WindowFunction,
    /// `CUBE`, `GROUPING SETS` and similar grouping extensions.
    GroupingSet,
    /// `EXPLAIN` options and formats.
    Explain,
    /// Common table expressions.
    Cte,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Returning => "RETURNING",
            Self::Json => "JSON",
            Self::WindowFunction => "window functions",
            Self::GroupingSet => "grouping sets",
            Self::Explain => "EXPLAIN",
            Self::Cte => "common table expressions",
        })
    }
}

/// Why a feature is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limitation {
    /// The engine does not implement the feature at any version.
    Engine,
    /// The feature exists from `required` onward.
    VersionGate {
        /// First version that supports the feature.
        required: ServerVersion,
        /// Version the dialect is bound to.
        current: ServerVersion,
    },
}

/// A feature-specific refusal raised instead of rendering invalid SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotSupportedError {
    /// The refused feature.
    pub feature: Feature,
    /// Engine limitation or version gate.
    pub limitation: Limitation,
    /// Human-readable explanation.
    pub detail: String,
}

impl NotSupportedError {
    /// A refusal caused by the engine itself.
    #[must_use]
    pub fn engine(feature: Feature, detail: impl Into<String>) -> Self {
        Self {
            feature,
            limitation: Limitation::Engine,
            detail: detail.into(),
        }
    }

    /// A refusal caused by the bound server version.
    #[must_use]
    pub fn version(
        feature: Feature,
        detail: impl Into<String>,
        required: ServerVersion,
        current: ServerVersion,
    ) -> Self {
        Self {
            feature,
            limitation: Limitation::VersionGate { required, current },
            detail: detail.into(),
        }
    }

    /// Returns whether upgrading the server would lift the refusal.
    #[must_use]
    pub const fn is_version_gated(&self) -> bool {
        matches!(self.limitation, Limitation::VersionGate { .. })
    }
}

impl fmt::Display for NotSupportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limitation {
            Limitation::Engine => write!(f, "{}", self.detail),
            Limitation::VersionGate { required, current } => write!(
                f,
                "{}: requires version >= {required}, current {current}",
                self.detail
            ),
        }
    }
}

impl std::error::Error for NotSupportedError {}

/// Direction of a failed value conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host value to wire value.
    ToWire,
    /// Wire value to host value.
    FromWire,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ToWire => "to wire value for",
            Self::FromWire => "from wire value as",
        })
    }
}

/// A value that could not be converted; nothing is partially converted.
#[derive(Debug, thiserror::Error)]
#[error("Cannot convert {value} {direction} {target}: {reason}")]
pub struct TypeConversionError {
    /// Debug rendering of the offending value.
    pub value: String,
    /// The type the value was converted to or from.
    pub target: AbstractType,
    /// Which way the conversion went.
    pub direction: Direction,
    /// Short explanation.
    pub reason: String,
    /// Underlying parse or decode error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TypeConversionError {
    /// Creates a conversion error for `value`.
    pub fn new(
        value: &impl fmt::Debug,
        target: AbstractType,
        direction: Direction,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            value: format!("{value:?}"),
            target,
            direction,
            reason: reason.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}
