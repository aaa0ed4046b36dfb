//! Tests for transaction control and savepoint emulation.

mod common;
use common::*;

use oxide_mysql::{
    DialectError, IsolationLevel, MemoryTransport, TransactionManager, TransactionState,
    Transport, TransportError,
};

async fn write(tx: &mut TransactionManager<MemoryTransport>, sql: &str) {
    tx.connection_mut()
        .execute(sql, &[])
        .await
        .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
}

fn committed_sql(tx: &TransactionManager<MemoryTransport>) -> Vec<&str> {
    tx.connection()
        .committed()
        .iter()
        .map(|m| m.sql.as_str())
        .collect()
}

#[tokio::test]
async fn inner_rollback_keeps_outer_work() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    write(&mut tx, "INSERT INTO t VALUES (1)").await;
    tx.begin(None).await.unwrap();
    assert_eq!(tx.depth(), 1);
    write(&mut tx, "INSERT INTO t VALUES (2)").await;
    tx.rollback().await.unwrap();
    assert_eq!(tx.depth(), 0);
    assert!(tx.is_active());
    tx.commit().await.unwrap();

    assert_eq!(tx.state(), TransactionState::Committed);
    assert_eq!(committed_sql(&tx), vec!["INSERT INTO t VALUES (1)"]);
    assert!(tx.connection().pending().is_empty());
    assert_eq!(
        tx.connection().statements(),
        &[
            "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            "START TRANSACTION",
            "INSERT INTO t VALUES (1)",
            "SAVEPOINT `SP_1`",
            "INSERT INTO t VALUES (2)",
            "ROLLBACK TO SAVEPOINT `SP_1`",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn inner_commit_then_outer_rollback_discards_everything() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    write(&mut tx, "INSERT INTO t VALUES (1)").await;
    tx.begin(None).await.unwrap();
    write(&mut tx, "INSERT INTO t VALUES (2)").await;
    tx.commit().await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert!(committed_sql(&tx).is_empty());
    assert!(tx
        .connection()
        .statements()
        .contains(&String::from("RELEASE SAVEPOINT `SP_1`")));
}

#[tokio::test]
async fn three_levels_use_distinct_savepoints() {
    let mut tx = manager();
    for _ in 0..3 {
        tx.begin(None).await.unwrap();
    }
    assert_eq!(tx.depth(), 2);
    assert_eq!(tx.connection().savepoints(), vec!["SP_1", "SP_2"]);
    tx.commit().await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(tx.depth(), 0);
    assert!(tx.connection().savepoints().is_empty());
    assert!(tx.is_active());
    tx.commit().await.unwrap();
    assert!(!tx.is_active());
}

#[tokio::test]
async fn rollback_to_earlier_savepoint_invalidates_later_one() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    let a = tx.savepoint("a").await.unwrap();
    write(&mut tx, "INSERT INTO t VALUES (1)").await;
    let b = tx.savepoint("b").await.unwrap();
    write(&mut tx, "INSERT INTO t VALUES (2)").await;

    tx.rollback_to(&a).await.unwrap();
    assert!(tx.connection().pending().is_empty());

    let err = tx.rollback_to(&b).await.unwrap_err();
    assert!(matches!(err, DialectError::Transaction(_)));
    // `a` survives its own rollback.
    tx.rollback_to(&a).await.unwrap();
    tx.commit().await.unwrap();
    assert!(committed_sql(&tx).is_empty());
}

#[tokio::test]
async fn release_drops_later_savepoints() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    let a = tx.savepoint("a").await.unwrap();
    let b = tx.savepoint("b").await.unwrap();
    tx.release(&a).await.unwrap();
    assert!(tx.release(&b).await.is_err());
    assert!(tx.rollback_to(&a).await.is_err());
}

#[tokio::test]
async fn savepoint_from_outer_level_is_rejected_inside_nested_level() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    let outer = tx.savepoint("outer").await.unwrap();
    tx.begin(None).await.unwrap();
    assert!(matches!(
        tx.rollback_to(&outer).await,
        Err(DialectError::Transaction(_))
    ));
    tx.commit().await.unwrap();
    tx.rollback_to(&outer).await.unwrap();
}

#[tokio::test]
async fn savepoints_of_a_closed_level_are_gone() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    tx.begin(None).await.unwrap();
    let inner = tx.savepoint("inner").await.unwrap();
    tx.rollback().await.unwrap();
    assert!(tx.release(&inner).await.is_err());
}

#[tokio::test]
async fn isolation_level_applies_to_next_begin() {
    let mut tx = manager();
    tx.begin(Some(IsolationLevel::Serializable)).await.unwrap();
    assert!(matches!(
        tx.set_isolation_level(IsolationLevel::ReadCommitted),
        Err(DialectError::IsolationLevel(_))
    ));
    tx.commit().await.unwrap();
    tx.set_isolation_level(IsolationLevel::ReadCommitted).unwrap();
    tx.begin(None).await.unwrap();
    let statements = tx.connection().statements();
    assert_eq!(
        statements[0],
        "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"
    );
    assert!(statements.contains(&String::from(
        "SET TRANSACTION ISOLATION LEVEL READ COMMITTED"
    )));
}

#[tokio::test]
async fn commit_without_transaction_fails() {
    let mut tx = manager();
    assert!(matches!(
        tx.commit().await,
        Err(DialectError::Transaction(_))
    ));
    assert!(matches!(
        tx.rollback().await,
        Err(DialectError::Transaction(_))
    ));
    assert!(tx.savepoint("x").await.is_err());
    assert!(tx.connection().statements().is_empty());
}

#[tokio::test]
async fn server_side_transaction_is_adopted() {
    let mut conn = MemoryTransport::new();
    conn.open_server_transaction();
    let mut tx = TransactionManager::new(conn);
    tx.begin(None).await.unwrap();
    assert!(tx.is_adopted());
    assert!(tx.connection().statements().is_empty());
    tx.commit().await.unwrap();
    assert!(!tx.connection().in_transaction());
}

#[tokio::test]
async fn failed_commit_requires_rollback() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    tx.connection_mut()
        .fail_on("COMMIT", TransportError::server(1213, "Deadlock found"));
    assert!(matches!(tx.commit().await, Err(DialectError::Deadlock(_))));
    assert_eq!(tx.state(), TransactionState::Failed);
    assert!(tx.begin(None).await.is_err());

    tx.rollback().await.unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
    tx.begin(None).await.unwrap();
    assert!(tx.is_active());
}

#[tokio::test]
async fn lost_connection_fails_begin() {
    let mut conn = MemoryTransport::new();
    conn.disconnect();
    let mut tx = TransactionManager::new(conn);
    assert!(matches!(
        tx.begin(None).await,
        Err(DialectError::Connection(_))
    ));
    assert_eq!(tx.state(), TransactionState::Failed);
}

#[tokio::test]
async fn nested_savepoint_names_are_reserved() {
    let mut tx = manager();
    tx.begin(None).await.unwrap();
    tx.begin(None).await.unwrap();
    for name in ["SP_1", "sp_2"] {
        let err = tx.savepoint(name).await.unwrap_err();
        assert!(matches!(err, DialectError::Transaction(_)), "{name} gave {err:?}");
    }
    assert_eq!(tx.connection().savepoints(), vec!["SP_1"]);
    tx.savepoint("SP_user").await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(tx.depth(), 0);
}
