//! Transaction state machine with savepoint-emulated nesting.
//!
//! MySQL allows one transaction per session. The first [`TransactionManager::begin`]
//! starts it; every nested `begin` opens an implicit savepoint `SP_<n>` that the matching
//! `commit` releases and the matching `rollback` rolls back to.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::dialect::quote_identifier;
use crate::error::{DialectError, Result};
use crate::transport::{Transport, TransportErrorKind};

const IMPLICIT_PREFIX: &str = "SP_";

// Savepoint names are case-insensitive on the server.
fn is_implicit_name(name: &str) -> bool {
    name.get(..IMPLICIT_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMPLICIT_PREFIX))
        && name.len() > IMPLICIT_PREFIX.len()
        && name[IMPLICIT_PREFIX.len()..].bytes().all(|b| b.is_ascii_digit())
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    /// InnoDB default.
    #[default]
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        })
    }
}

/// Lifecycle of the session's transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Inactive,
    Active,
    Committed,
    RolledBack,
    /// A real begin, commit or rollback failed; only `rollback` is accepted.
    Failed,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
            Self::Committed => "COMMITTED",
            Self::RolledBack => "ROLLED_BACK",
            Self::Failed => "FAILED",
        })
    }
}

/// Handle to a named savepoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
    order: u64,
    depth: usize,
}

impl Savepoint {
    /// Savepoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation order within the manager.
    #[must_use]
    pub const fn order(&self) -> u64 {
        self.order
    }

    /// Nesting depth the savepoint was created at.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

/// Drives `START TRANSACTION`, `COMMIT`, `ROLLBACK` and savepoints on one session.
#[derive(Debug)]
pub struct TransactionManager<C: Transport> {
    conn: C,
    state: TransactionState,
    isolation_level: IsolationLevel,
    implicit: Vec<String>,
    implicit_counter: u64,
    named: Vec<Savepoint>,
    next_order: u64,
    adopted: bool,
}

impl<C: Transport> TransactionManager<C> {
    /// Creates an inactive manager that owns `conn`.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            state: TransactionState::Inactive,
            isolation_level: IsolationLevel::default(),
            implicit: Vec::new(),
            implicit_counter: 0,
            named: Vec::new(),
            next_order: 0,
            adopted: false,
        }
    }

    /// The underlying session.
    pub const fn connection(&self) -> &C {
        &self.conn
    }

    /// The underlying session, for statements outside transaction control.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Gives the session back.
    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Current state.
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns whether a transaction is open.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of nested `begin` calls above the real transaction.
    pub fn depth(&self) -> usize {
        self.implicit.len()
    }

    /// Returns whether the open transaction was started by someone else.
    pub const fn is_adopted(&self) -> bool {
        self.adopted
    }

    /// Isolation level used by the next real `begin`.
    pub const fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Changes the isolation level. Rejected while a transaction is open.
    pub fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<()> {
        if self.is_active() {
            return Err(DialectError::IsolationLevel(String::from(
                "Cannot change isolation level during active transaction",
            )));
        }
        self.isolation_level = level;
        Ok(())
    }

    async fn run(&mut self, sql: &str) -> Result<()> {
        debug!(sql, "Transaction statement");
        self.conn.execute(sql, &[]).await?;
        Ok(())
    }

    fn fail(&mut self, action: &str, err: DialectError) -> DialectError {
        error!(action, error = %err, "Transaction statement failed");
        self.state = TransactionState::Failed;
        err
    }

    fn reset(&mut self) {
        self.implicit.clear();
        self.named.clear();
        self.adopted = false;
    }

    fn adopt(&mut self) {
        warn!("Server already has an open transaction, adopting it");
        self.reset();
        self.adopted = true;
        self.state = TransactionState::Active;
    }

    /// Starts a transaction, or a nested level if one is already open.
    ///
    /// `isolation` replaces the stored level before a real start; it is ignored for
    /// nested levels.
    pub async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        match self.state {
            TransactionState::Active => return self.begin_nested().await,
            TransactionState::Failed => {
                return Err(DialectError::Transaction(String::from(
                    "Transaction has failed; roll it back before starting a new one",
                )))
            }
            TransactionState::Inactive
            | TransactionState::Committed
            | TransactionState::RolledBack => {}
        }

        if let Some(level) = isolation {
            self.isolation_level = level;
        }
        match self.conn.has_open_transaction().await {
            Ok(true) => {
                self.adopt();
                return Ok(());
            }
            Ok(false) => {}
            Err(err) => return Err(self.fail("begin", err.into())),
        }

        let set_level = format!("SET TRANSACTION ISOLATION LEVEL {}", self.isolation_level);
        if let Err(err) = self.run(&set_level).await {
            return Err(self.fail("begin", err));
        }
        debug!("START TRANSACTION");
        match self.conn.execute("START TRANSACTION", &[]).await {
            Ok(_) => {
                self.reset();
                self.state = TransactionState::Active;
                info!(isolation = %self.isolation_level, "Transaction started");
                Ok(())
            }
            Err(err) if err.kind == TransportErrorKind::TransactionInProgress => {
                self.adopt();
                Ok(())
            }
            Err(err) => Err(self.fail("begin", err.into())),
        }
    }

    async fn begin_nested(&mut self) -> Result<()> {
        self.implicit_counter += 1;
        let name = format!("{IMPLICIT_PREFIX}{}", self.implicit_counter);
        let sql = format!("SAVEPOINT {}", quote_identifier(&name));
        if let Err(err) = self.run(&sql).await {
            return Err(self.fail("begin", err));
        }
        self.implicit.push(name);
        debug!(depth = self.depth(), "Nested transaction started");
        Ok(())
    }

    fn require_active(&self, action: &str) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DialectError::Transaction(format!(
                "No active transaction to {action} (state {})",
                self.state
            )))
        }
    }

    // Named savepoints created inside a finished level go away with it.
    fn close_level(&mut self, depth: usize) {
        self.named.retain(|sp| sp.depth < depth);
    }

    /// Commits the innermost level.
    pub async fn commit(&mut self) -> Result<()> {
        self.require_active("commit")?;
        let depth = self.depth();
        if let Some(name) = self.implicit.pop() {
            let sql = format!("RELEASE SAVEPOINT {}", quote_identifier(&name));
            if let Err(err) = self.run(&sql).await {
                return Err(self.fail("commit", err));
            }
            self.close_level(depth);
            debug!(depth = self.depth(), "Nested transaction committed");
            return Ok(());
        }

        if let Err(err) = self.run("COMMIT").await {
            return Err(self.fail("commit", err));
        }
        self.reset();
        self.state = TransactionState::Committed;
        info!("Transaction committed");
        Ok(())
    }

    /// Rolls back the innermost level.
    ///
    /// From the failed state this cleans up the session and always ends rolled back.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state == TransactionState::Failed {
            if let Err(err) = self.run("ROLLBACK").await {
                warn!(error = %err, "Rollback after failure did not complete");
            }
            self.reset();
            self.state = TransactionState::RolledBack;
            info!("Failed transaction rolled back");
            return Ok(());
        }

        self.require_active("roll back")?;
        let depth = self.depth();
        if let Some(name) = self.implicit.pop() {
            let sql = format!("ROLLBACK TO SAVEPOINT {}", quote_identifier(&name));
            if let Err(err) = self.run(&sql).await {
                return Err(self.fail("rollback", err));
            }
            self.close_level(depth);
            debug!(depth = self.depth(), "Nested transaction rolled back");
            return Ok(());
        }

        if let Err(err) = self.run("ROLLBACK").await {
            return Err(self.fail("rollback", err));
        }
        self.reset();
        self.state = TransactionState::RolledBack;
        info!("Transaction rolled back");
        Ok(())
    }

    /// Creates a named savepoint at the current level. Reusing a name replaces the older one.
    pub async fn savepoint(&mut self, name: &str) -> Result<Savepoint> {
        self.require_active("create a savepoint in")?;
        if name.is_empty() {
            return Err(DialectError::Transaction(String::from(
                "Savepoint name must not be empty",
            )));
        }
        if is_implicit_name(name) {
            return Err(DialectError::Transaction(format!(
                "Savepoint name {name} is reserved for nested transactions"
            )));
        }
        self.run(&format!("SAVEPOINT {}", quote_identifier(name)))
            .await?;
        self.named.retain(|sp| sp.name != name);
        let savepoint = Savepoint {
            name: String::from(name),
            order: self.next_order,
            depth: self.depth(),
        };
        self.next_order += 1;
        self.named.push(savepoint.clone());
        debug!(savepoint = name, depth = savepoint.depth, "Savepoint created");
        Ok(savepoint)
    }

    fn locate(&self, savepoint: &Savepoint) -> Result<usize> {
        let index = self
            .named
            .iter()
            .position(|sp| sp == savepoint)
            .ok_or_else(|| {
                DialectError::Transaction(format!(
                    "Savepoint {} no longer exists",
                    savepoint.name
                ))
            })?;
        if savepoint.depth != self.depth() {
            return Err(DialectError::Transaction(format!(
                "Savepoint {} belongs to nesting level {}, current level is {}",
                savepoint.name,
                savepoint.depth,
                self.depth()
            )));
        }
        Ok(index)
    }

    /// Releases `savepoint` and every savepoint created after it.
    pub async fn release(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.require_active("release a savepoint in")?;
        let index = self.locate(savepoint)?;
        self.run(&format!(
            "RELEASE SAVEPOINT {}",
            quote_identifier(&savepoint.name)
        ))
        .await?;
        self.named.truncate(index);
        debug!(savepoint = %savepoint.name, "Savepoint released");
        Ok(())
    }

    /// Rolls back to `savepoint`, invalidating every savepoint created after it.
    pub async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.require_active("roll back a savepoint in")?;
        let index = self.locate(savepoint)?;
        self.run(&format!(
            "ROLLBACK TO SAVEPOINT {}",
            quote_identifier(&savepoint.name)
        ))
        .await?;
        self.named.truncate(index + 1);
        debug!(savepoint = %savepoint.name, "Rolled back to savepoint");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, TransportError};

    fn manager() -> TransactionManager<MemoryTransport> {
        TransactionManager::new(MemoryTransport::new())
    }

    #[tokio::test]
    async fn test_begin_commit() {
        let mut tx = manager();
        tx.begin(None).await.unwrap();
        assert!(tx.is_active());
        tx.commit().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(
            tx.connection().statements(),
            [
                "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
                "START TRANSACTION",
                "COMMIT"
            ]
        );
    }

    #[tokio::test]
    async fn test_nested_levels_use_savepoints() {
        let mut tx = manager();
        tx.begin(None).await.unwrap();
        tx.begin(None).await.unwrap();
        tx.begin(None).await.unwrap();
        assert_eq!(tx.depth(), 2);
        tx.commit().await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(tx.depth(), 0);
        assert!(tx.is_active());
        let statements = tx.connection().statements();
        assert_eq!(
            &statements[2..],
            [
                "SAVEPOINT `SP_1`",
                "SAVEPOINT `SP_2`",
                "RELEASE SAVEPOINT `SP_2`",
                "ROLLBACK TO SAVEPOINT `SP_1`"
            ]
        );
    }

    #[tokio::test]
    async fn test_isolation_level_locked_while_active() {
        let mut tx = manager();
        tx.set_isolation_level(IsolationLevel::Serializable).unwrap();
        tx.begin(None).await.unwrap();
        assert!(matches!(
            tx.set_isolation_level(IsolationLevel::ReadCommitted),
            Err(DialectError::IsolationLevel(_))
        ));
        tx.rollback().await.unwrap();
        tx.set_isolation_level(IsolationLevel::ReadCommitted).unwrap();
        tx.begin(Some(IsolationLevel::ReadUncommitted)).await.unwrap();
        assert_eq!(tx.isolation_level(), IsolationLevel::ReadUncommitted);
    }

    #[tokio::test]
    async fn test_commit_without_transaction() {
        let mut tx = manager();
        assert!(matches!(tx.commit().await, Err(DialectError::Transaction(_))));
        assert!(matches!(tx.rollback().await, Err(DialectError::Transaction(_))));
    }

    #[tokio::test]
    async fn test_adopts_server_transaction() {
        let mut conn = MemoryTransport::new();
        conn.open_server_transaction();
        let mut tx = TransactionManager::new(conn);
        tx.begin(None).await.unwrap();
        assert!(tx.is_active());
        assert!(tx.is_adopted());
        assert!(tx.connection().statements().is_empty());
    }

    #[tokio::test]
    async fn test_adopts_transaction_in_progress_error() {
        let mut conn = MemoryTransport::new();
        conn.fail_on(
            "START TRANSACTION",
            TransportError::transaction_in_progress("Transaction already in progress"),
        );
        let mut tx = TransactionManager::new(conn);
        tx.begin(None).await.unwrap();
        assert!(tx.is_adopted());
    }

    #[tokio::test]
    async fn test_failed_commit_then_rollback() {
        let mut conn = MemoryTransport::new();
        conn.fail_on("COMMIT", TransportError::server(1213, "Deadlock found"));
        let mut tx = TransactionManager::new(conn);
        tx.begin(None).await.unwrap();
        assert!(matches!(tx.commit().await, Err(DialectError::Deadlock(_))));
        assert_eq!(tx.state(), TransactionState::Failed);
        assert!(tx.begin(None).await.is_err());
        tx.rollback().await.unwrap();
        assert_eq!(tx.state(), TransactionState::RolledBack);
        tx.begin(None).await.unwrap();
        assert!(tx.is_active());
    }

    #[tokio::test]
    async fn test_named_savepoints_scoped_to_level() {
        let mut tx = manager();
        tx.begin(None).await.unwrap();
        let outer = tx.savepoint("outer").await.unwrap();
        tx.begin(None).await.unwrap();
        let inner = tx.savepoint("inner").await.unwrap();
        assert!(tx.rollback_to(&outer).await.is_err());
        tx.commit().await.unwrap();
        assert!(tx.release(&inner).await.is_err());
        tx.release(&outer).await.unwrap();
    }

    #[tokio::test]
    async fn test_reused_name_replaces_savepoint() {
        let mut tx = manager();
        tx.begin(None).await.unwrap();
        let first = tx.savepoint("a").await.unwrap();
        let second = tx.savepoint("a").await.unwrap();
        assert!(tx.rollback_to(&first).await.is_err());
        tx.rollback_to(&second).await.unwrap();
        assert!(first.order() < second.order());
    }

    #[test]
    fn test_implicit_names() {
        assert!(is_implicit_name("SP_1"));
        assert!(is_implicit_name("sp_42"));
        assert!(!is_implicit_name("SP_"));
        assert!(!is_implicit_name("SP_a"));
        assert!(!is_implicit_name("SPX1"));
        assert!(!is_implicit_name("é"));
    }
}
