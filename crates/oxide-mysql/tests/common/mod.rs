#![allow(dead_code)]

use oxide_mysql::transport::{ColumnMeta, RowSet};
use oxide_mysql::{
    MemoryTransport, MySqlBackend, MySqlConfig, MySqlDialect, ServerVersion, TransactionManager,
    WireValue,
};

pub fn dialect(major: u16, minor: u16, patch: u16) -> MySqlDialect {
    MySqlDialect::new(ServerVersion::new(major, minor, patch))
}

pub fn manager() -> TransactionManager<MemoryTransport> {
    TransactionManager::new(MemoryTransport::new())
}

/// A config that skips version detection and session setup noise.
pub fn pinned_config(version: ServerVersion) -> MySqlConfig {
    MySqlConfig {
        server_version: Some(version),
        init_command: None,
        ..MySqlConfig::default()
    }
}

pub async fn backend() -> MySqlBackend<MemoryTransport> {
    backend_with(MemoryTransport::new(), pinned_config(ServerVersion::DEFAULT)).await
}

/// Routes adapter logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub async fn backend_with(
    transport: MemoryTransport,
    config: MySqlConfig,
) -> MySqlBackend<MemoryTransport> {
    init_tracing();
    MySqlBackend::connect(transport, config)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect: {e}"))
}

pub fn row_set(columns: &[(&str, &str)], rows: Vec<Vec<WireValue>>) -> RowSet {
    RowSet {
        columns: columns
            .iter()
            .map(|(name, ty)| ColumnMeta::new(*name, *ty))
            .collect(),
        rows,
    }
}

pub fn text(s: &str) -> WireValue {
    WireValue::Text(String::from(s))
}

/// Statements sent after the session setup.
pub fn statements_since_setup(backend: &MySqlBackend<MemoryTransport>) -> Vec<String> {
    backend
        .connection()
        .statements()
        .iter()
        .filter(|s| !s.starts_with("SET NAMES") && !s.starts_with("SET autocommit"))
        .cloned()
        .collect()
}
