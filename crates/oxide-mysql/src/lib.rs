//! # oxide-mysql
//!
//! A MySQL dialect adapter: engine-agnostic column types, values, statements and
//! transactions translated for one MySQL server version.
//!
//! This crate provides:
//! - Version-gated column DDL through [`TypeMapper`]
//! - Bidirectional value conversion through [`ValueMapper`]
//! - Capability handlers that render a feature or refuse it with a [`NotSupportedError`]
//! - A statement builder that splices [`RawExpression`]s and binds everything else
//! - A [`TransactionManager`] that emulates nested transactions with savepoints
//!
//! # How MySQL differs from other dialects
//!
//! - **No `RETURNING`** at any version. The [`ReturningHandler`] refuses it and plans a
//!   follow-up `SELECT` instead.
//! - **Identifier quoting** uses backticks.
//! - **`OFFSET` needs `LIMIT`**: an offset alone is rendered with the largest row count.
//! - **One transaction per session**: nested `begin` calls become savepoints.
//! - **Feature gates** move with the server: `JSON` from 5.7.8, window functions and
//!   CTEs from 8.0, `CHECK` from 8.0.16, `EXPLAIN FORMAT=TREE` from 8.0.16.
//!
//! ## Example
//!
//! ```rust
//! use oxide_mysql::prelude::*;
//!
//! let dialect = MySqlDialect::new(ServerVersion::new(5, 6, 0));
//! let ddl = dialect
//!     .column_definition(AbstractType::Json, &ColumnParams::new().not_null())
//!     .unwrap();
//! assert_eq!(ddl, "LONGTEXT NOT NULL");
//!
//! let built = dialect
//!     .build(
//!         "UPDATE t SET n = %s, updated_at = %s WHERE id = %s",
//!         vec![Param::value(5_i64), Param::raw("NOW()"), Param::value(9_i64)],
//!     )
//!     .unwrap();
//! assert_eq!(built.sql, "UPDATE t SET n = %s, updated_at = NOW() WHERE id = %s");
//! assert_eq!(built.params.len(), 2);
//! ```

pub mod backend;
pub mod builder;
pub mod capabilities;
pub mod config;
pub mod dialect;
pub mod error;
pub mod handlers;
pub mod result;
pub mod statement;
pub mod transaction;
pub mod transport;
pub mod types;
pub mod value;
pub mod version;

pub use backend::{ExecuteOptions, MySqlBackend, ReturningRequest};
pub use builder::{BuiltStatement, Param, RawExpression, SqlBuilder};
pub use capabilities::{Capabilities, Capability};
pub use config::MySqlConfig;
pub use dialect::{Dialect, DialectOptions, MySqlDialect, PlaceholderStyle};
pub use error::{DialectError, NotSupportedError, Result, TypeConversionError};
pub use handlers::{
    AggregateHandler, CapabilityHandler, CteHandler, ExplainFormat, ExplainHandler,
    ExplainOptions, JsonHandler, ReturningHandler,
};
pub use result::{QueryResult, Row};
pub use transaction::{IsolationLevel, Savepoint, TransactionManager, TransactionState};
pub use transport::{MemoryTransport, Transport, TransportError};
pub use types::{AbstractType, ColumnParams, DefaultValue, TypeMapper};
pub use value::{SqlValue, ToSqlValue, UuidStorage, ValueMapper, WireValue};
pub use version::{ServerVersion, VersionGate};

/// Re-exports of the common types.
pub mod prelude {
    pub use crate::backend::{ExecuteOptions, MySqlBackend, ReturningRequest};
    pub use crate::builder::{Param, RawExpression};
    pub use crate::config::MySqlConfig;
    pub use crate::dialect::{Dialect, MySqlDialect};
    pub use crate::error::{DialectError, Result};
    pub use crate::handlers::{CapabilityHandler, ExplainFormat, ExplainOptions, JsonOperation};
    pub use crate::transaction::IsolationLevel;
    pub use crate::types::{AbstractType, ColumnParams};
    pub use crate::value::{SqlValue, ToSqlValue};
    pub use crate::version::ServerVersion;
}
