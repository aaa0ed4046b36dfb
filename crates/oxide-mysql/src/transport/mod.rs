//! The boundary to the driver that actually talks to the server.
//!
//! Everything above this trait is synchronous, I/O-free logic. Implementations of
//! [`Transport`] are the only place where the adapter suspends.

mod memory;
#[cfg(feature = "sqlx-mysql")]
mod sqlx_mysql;

pub use memory::{MemoryTransport, Mutation};

use crate::dialect::PlaceholderStyle;
use crate::value::WireValue;

/// Category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection could not be established or was lost.
    Connection,
    /// The server rejected the statement.
    Server,
    /// The server reported that a transaction is already in progress.
    TransactionInProgress,
    /// A returned value could not be decoded.
    Decode,
}

/// A failure reported by the transport, with the MySQL error number when known.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// MySQL server error number.
    pub code: Option<u16>,
    /// Server or driver message.
    pub message: String,
}

impl TransportError {
    /// A server-side error with a MySQL error number.
    #[must_use]
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Server,
            code: Some(code),
            message: message.into(),
        }
    }

    /// A lost or refused connection.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Connection,
            code: None,
            message: message.into(),
        }
    }

    /// The server already has a transaction open on this session.
    #[must_use]
    pub fn transaction_in_progress(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::TransactionInProgress,
            code: None,
            message: message.into(),
        }
    }

    /// A value the driver could not decode.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Decode,
            code: None,
            message: message.into(),
        }
    }
}

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    /// Rows changed by the statement.
    pub affected_rows: u64,
    /// `LAST_INSERT_ID()` after the statement, when the server reported one.
    pub last_insert_id: Option<u64>,
}

/// Column metadata reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column label as projected.
    pub name: String,
    /// Server type name such as `INT`, `VARCHAR` or `JSON`.
    pub type_name: String,
}

impl ColumnMeta {
    /// Creates column metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Raw rows as they came off the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    /// Projected columns, in order.
    pub columns: Vec<ColumnMeta>,
    /// One entry per row, aligned with `columns`.
    pub rows: Vec<Vec<WireValue>>,
}

/// A live session on a MySQL server.
///
/// Statements issued through one transport execute in the order they were issued.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Executes a statement that returns no rows.
    async fn execute(
        &mut self,
        sql: &str,
        params: &[WireValue],
    ) -> Result<ExecOutcome, TransportError>;

    /// Executes a statement and collects its rows.
    async fn query(&mut self, sql: &str, params: &[WireValue]) -> Result<RowSet, TransportError>;

    /// Executes one statement once per parameter set, in order.
    async fn execute_batch(
        &mut self,
        sql: &str,
        batches: &[Vec<WireValue>],
    ) -> Result<ExecOutcome, TransportError> {
        let mut total = ExecOutcome::default();
        for params in batches {
            let outcome = self.execute(sql, params).await?;
            total.affected_rows += outcome.affected_rows;
            if outcome.last_insert_id.is_some() {
                total.last_insert_id = outcome.last_insert_id;
            }
        }
        Ok(total)
    }

    /// Checks that the session is still usable.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Reports whether the server already has an uncommitted transaction on this session.
    async fn has_open_transaction(&mut self) -> Result<bool, TransportError> {
        Ok(false)
    }

    /// The only bind placeholder the driver understands, if it is picky.
    fn placeholder_style(&self) -> Option<PlaceholderStyle> {
        None
    }
}
