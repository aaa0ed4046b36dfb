//! `RETURNING` handling: always refused, with a follow-up read as the fallback.

use super::CapabilityHandler;
use crate::dialect::{quote_identifier, quote_qualified};
use crate::error::{Feature, NotSupportedError};
use crate::version::ServerVersion;

const NOT_SUPPORTED: &str = "RETURNING clause is not supported by MySQL. This is a fundamental \
     limitation of the database engine, not a driver issue.";

/// The kind of write a fallback read is planned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// `INSERT`: read back by `LAST_INSERT_ID()`.
    Insert,
    /// `UPDATE`: read back by the caller's predicate after the write.
    Update,
    /// `DELETE`: read by the caller's predicate before the write.
    Delete,
}

/// A `SELECT` standing in for a `RETURNING` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPlan {
    /// The read statement.
    pub select: String,
    /// Whether the read must run before the write (rows are gone afterwards).
    pub run_before: bool,
}

/// `RETURNING` handler. MySQL has no `RETURNING` at any version.
#[derive(Debug, Clone, Copy)]
pub struct ReturningHandler {
    version: ServerVersion,
}

impl ReturningHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(version: ServerVersion) -> Self {
        Self { version }
    }

    /// Always fails: the engine cannot return rows from a write.
    #[allow(clippy::unused_self)]
    pub fn render(&self, _columns: &[&str]) -> Result<String, NotSupportedError> {
        Err(NotSupportedError::engine(Feature::Returning, NOT_SUPPORTED))
    }

    /// Plans the read a caller can issue instead of `RETURNING`.
    ///
    /// Inserts are read back through `primary_key = LAST_INSERT_ID()`; updates and
    /// deletes need `predicate`. `table` may be schema-qualified.
    pub fn fallback_plan(
        &self,
        kind: WriteKind,
        table: &str,
        columns: &[&str],
        primary_key: &str,
        predicate: Option<&str>,
    ) -> Result<FallbackPlan, NotSupportedError> {
        let projection = if columns.is_empty() {
            String::from("*")
        } else {
            columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let table = quote_qualified(table);
        let filter = match (kind, predicate) {
            (WriteKind::Insert, _) => {
                format!("{} = LAST_INSERT_ID()", quote_identifier(primary_key))
            }
            (_, Some(predicate)) => String::from(predicate),
            (_, None) => {
                return Err(NotSupportedError::engine(
                    Feature::Returning,
                    format!(
                        "RETURNING clause is not supported by MySQL {} and {kind:?} has no \
                         predicate to read the affected rows back with",
                        self.version
                    ),
                ))
            }
        };
        Ok(FallbackPlan {
            select: format!("SELECT {projection} FROM {table} WHERE {filter}"),
            run_before: kind == WriteKind::Delete,
        })
    }
}

impl CapabilityHandler for ReturningHandler {
    fn feature(&self) -> Feature {
        Feature::Returning
    }

    fn is_supported(&self) -> bool {
        false
    }
}
