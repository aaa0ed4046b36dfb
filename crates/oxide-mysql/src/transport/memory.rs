//! An in-memory transactional session.
//!
//! `MemoryTransport` understands transaction control and savepoint statements and treats
//! every other non-query statement as a mutation. Mutations issued inside a transaction
//! stay pending until `COMMIT`, and savepoints snapshot the pending list so
//! `ROLLBACK TO SAVEPOINT` discards exactly what came after them.

use std::collections::VecDeque;

use super::{ColumnMeta, ExecOutcome, RowSet, Transport, TransportError};
use crate::dialect::PlaceholderStyle;
use crate::statement::StatementKind;
use crate::value::WireValue;

const ER_PARSE_ERROR: u16 = 1064;
const ER_SP_DOES_NOT_EXIST: u16 = 1305;
const CR_SERVER_GONE_ERROR: &str = "MySQL server has gone away";

/// A write recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Statement text.
    pub sql: String,
    /// Bound values.
    pub params: Vec<WireValue>,
}

#[derive(Debug)]
struct SavepointMark {
    name: String,
    pending_len: usize,
}

/// Scriptable fake MySQL session.
#[derive(Debug)]
pub struct MemoryTransport {
    version: String,
    connected: bool,
    statements: Vec<String>,
    committed: Vec<Mutation>,
    pending: Vec<Mutation>,
    in_transaction: bool,
    savepoints: Vec<SavepointMark>,
    result_sets: VecDeque<RowSet>,
    failures: Vec<(String, TransportError)>,
    next_insert_id: u64,
    placeholder: Option<PlaceholderStyle>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A connected session reporting version `8.0.36`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: String::from("8.0.36"),
            connected: true,
            statements: Vec::new(),
            committed: Vec::new(),
            pending: Vec::new(),
            in_transaction: false,
            savepoints: Vec::new(),
            result_sets: VecDeque::new(),
            failures: Vec::new(),
            next_insert_id: 1,
            placeholder: None,
        }
    }

    /// Sets the string returned by `SELECT VERSION()`.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Makes the session accept only `style` placeholders, like a picky driver.
    #[must_use]
    pub const fn with_placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = Some(style);
        self
    }

    /// Queues a result set for the next query other than `SELECT VERSION()`.
    pub fn add_result_set(&mut self, rows: RowSet) {
        self.result_sets.push_back(rows);
    }

    /// Fails the next statement starting with `prefix` (case-insensitive) with `error`.
    pub fn fail_on(&mut self, prefix: impl Into<String>, error: TransportError) {
        self.failures.push((prefix.into().to_ascii_uppercase(), error));
    }

    /// Drops the connection; every later call fails.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Opens a transaction that the caller did not start, as some drivers do implicitly.
    pub fn open_server_transaction(&mut self) {
        self.in_transaction = true;
    }

    /// Every statement received, in order.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Mutations made durable.
    #[must_use]
    pub fn committed(&self) -> &[Mutation] {
        &self.committed
    }

    /// Mutations of the open transaction.
    #[must_use]
    pub fn pending(&self) -> &[Mutation] {
        &self.pending
    }

    /// Returns whether the server side has a transaction open.
    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Names of the live savepoints, oldest first.
    #[must_use]
    pub fn savepoints(&self) -> Vec<&str> {
        self.savepoints.iter().map(|s| s.name.as_str()).collect()
    }

    fn receive(&mut self, sql: &str, params: &[WireValue]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::connection(CR_SERVER_GONE_ERROR));
        }
        self.statements.push(String::from(sql));
        if self.placeholder == Some(PlaceholderStyle::Qmark)
            && !params.is_empty()
            && sql.contains(PlaceholderStyle::Format.token())
        {
            return Err(TransportError::server(
                ER_PARSE_ERROR,
                "You have an error in your SQL syntax near '%s'",
            ));
        }
        let upper = sql.trim_start().to_ascii_uppercase();
        if let Some(index) = self
            .failures
            .iter()
            .position(|(prefix, _)| upper.starts_with(prefix.as_str()))
        {
            let (_, error) = self.failures.remove(index);
            return Err(error);
        }
        Ok(())
    }

    fn savepoint_index(&self, name: &str) -> Result<usize, TransportError> {
        self.savepoints
            .iter()
            .rposition(|s| s.name == name)
            .ok_or_else(|| {
                TransportError::server(
                    ER_SP_DOES_NOT_EXIST,
                    format!("SAVEPOINT {name} does not exist"),
                )
            })
    }

    fn end_transaction(&mut self, commit: bool) {
        if commit {
            self.committed.append(&mut self.pending);
        } else {
            self.pending.clear();
        }
        self.savepoints.clear();
        self.in_transaction = false;
    }
}

// Last word of the statement with identifier quoting removed.
fn object_name(sql: &str) -> String {
    let word = sql.split_whitespace().last().unwrap_or_default();
    word.strip_prefix('`')
        .and_then(|w| w.strip_suffix('`'))
        .unwrap_or(word)
        .replace("``", "`")
}

impl Transport for MemoryTransport {
    async fn execute(
        &mut self,
        sql: &str,
        params: &[WireValue],
    ) -> Result<ExecOutcome, TransportError> {
        self.receive(sql, params)?;
        let upper = sql.trim().to_ascii_uppercase();

        if upper == "START TRANSACTION" || upper == "BEGIN" {
            // The server commits implicitly before starting a new transaction.
            self.end_transaction(true);
            self.in_transaction = true;
        } else if upper == "COMMIT" {
            self.end_transaction(true);
        } else if upper.starts_with("ROLLBACK TO") {
            let index = self.savepoint_index(&object_name(sql))?;
            self.pending.truncate(self.savepoints[index].pending_len);
            self.savepoints.truncate(index + 1);
        } else if upper == "ROLLBACK" {
            self.end_transaction(false);
        } else if upper.starts_with("SAVEPOINT") {
            let name = object_name(sql);
            self.savepoints.retain(|s| s.name != name);
            self.savepoints.push(SavepointMark {
                name,
                pending_len: self.pending.len(),
            });
        } else if upper.starts_with("RELEASE SAVEPOINT") {
            let index = self.savepoint_index(&object_name(sql))?;
            self.savepoints.truncate(index);
        } else if upper.starts_with("SET ") || upper.starts_with("USE ") {
            // Session settings have no observable state here.
        } else if !StatementKind::classify(sql).returns_rows() {
            let mutation = Mutation {
                sql: String::from(sql),
                params: params.to_vec(),
            };
            if self.in_transaction {
                self.pending.push(mutation);
            } else {
                self.committed.push(mutation);
            }
            let last_insert_id = if upper.starts_with("INSERT") || upper.starts_with("REPLACE") {
                let id = self.next_insert_id;
                self.next_insert_id += 1;
                Some(id)
            } else {
                None
            };
            return Ok(ExecOutcome {
                affected_rows: 1,
                last_insert_id,
            });
        }
        Ok(ExecOutcome::default())
    }

    async fn query(&mut self, sql: &str, params: &[WireValue]) -> Result<RowSet, TransportError> {
        self.receive(sql, params)?;
        if sql.trim().eq_ignore_ascii_case("SELECT VERSION()") {
            return Ok(RowSet {
                columns: vec![ColumnMeta::new("VERSION()", "VARCHAR")],
                rows: vec![vec![WireValue::Text(self.version.clone())]],
            });
        }
        Ok(self.result_sets.pop_front().unwrap_or_default())
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if self.connected {
            Ok(())
        } else {
            Err(TransportError::connection(CR_SERVER_GONE_ERROR))
        }
    }

    async fn has_open_transaction(&mut self) -> Result<bool, TransportError> {
        self.ping().await?;
        Ok(self.in_transaction)
    }

    fn placeholder_style(&self) -> Option<PlaceholderStyle> {
        self.placeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_savepoint_snapshots() {
        let mut conn = MemoryTransport::new();
        conn.execute("START TRANSACTION", &[]).await.unwrap();
        conn.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        conn.execute("SAVEPOINT `a`", &[]).await.unwrap();
        conn.execute("INSERT INTO t VALUES (2)", &[]).await.unwrap();
        conn.execute("ROLLBACK TO SAVEPOINT `a`", &[]).await.unwrap();
        assert_eq!(conn.pending().len(), 1);
        assert_eq!(conn.savepoints(), vec!["a"]);
        conn.execute("COMMIT", &[]).await.unwrap();
        assert_eq!(conn.committed().len(), 1);
        assert!(!conn.in_transaction());
    }

    #[tokio::test]
    async fn test_unknown_savepoint() {
        let mut conn = MemoryTransport::new();
        conn.execute("START TRANSACTION", &[]).await.unwrap();
        let err = conn
            .execute("RELEASE SAVEPOINT `missing`", &[])
            .await
            .unwrap_err();
        assert_eq!(err.code, Some(ER_SP_DOES_NOT_EXIST));
    }

    #[tokio::test]
    async fn test_insert_ids_and_autocommit() {
        let mut conn = MemoryTransport::new();
        let first = conn.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        let second = conn.execute("INSERT INTO t VALUES (2)", &[]).await.unwrap();
        assert_eq!(first.last_insert_id, Some(1));
        assert_eq!(second.last_insert_id, Some(2));
        assert_eq!(conn.committed().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let mut conn = MemoryTransport::new();
        conn.fail_on("commit", TransportError::server(1213, "Deadlock found"));
        assert!(conn.execute("COMMIT", &[]).await.is_err());
        assert!(conn.execute("COMMIT", &[]).await.is_ok());
        conn.disconnect();
        assert!(conn.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_version_query() {
        let mut conn = MemoryTransport::new().with_version("5.7.44-log");
        let rows = conn.query("SELECT VERSION()", &[]).await.unwrap();
        assert_eq!(rows.rows[0][0], WireValue::Text("5.7.44-log".into()));
    }
}
