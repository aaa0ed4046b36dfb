//! A MySQL session: dialect, transaction manager and transport wired together.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::builder::{BuiltStatement, Param};
use crate::capabilities::Capabilities;
use crate::config::MySqlConfig;
use crate::dialect::{quote_identifier, quote_qualified, MySqlDialect};
use crate::error::{DialectError, Feature, NotSupportedError, Result};
use crate::handlers::{FallbackPlan, WriteKind};
use crate::result::{QueryResult, Row};
use crate::statement::{self, StatementKind};
use crate::transaction::{IsolationLevel, Savepoint, TransactionManager, TransactionState};
use crate::transport::{ExecOutcome, RowSet, Transport};
use crate::types::AbstractType;
use crate::value::{quote_literal, WireValue};
use crate::version::ServerVersion;

/// Columns to read back after a write, in place of a `RETURNING` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturningRequest {
    /// Columns to return; empty for all.
    pub columns: Vec<String>,
    /// Key compared with `LAST_INSERT_ID()`.
    pub primary_key: String,
    /// Condition selecting the rows an `UPDATE` or `DELETE` touches.
    pub predicate: Option<String>,
    /// Run a follow-up `SELECT` instead of failing.
    pub force: bool,
}

impl ReturningRequest {
    /// Requests `columns`, keyed by `id`.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            primary_key: String::from("id"),
            predicate: None,
            force: false,
        }
    }

    /// Sets the key column.
    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Sets the condition an `UPDATE` or `DELETE` is read back with. It is spliced
    /// verbatim, so never build it from user input.
    #[must_use]
    pub fn predicate(mut self, sql: impl Into<String>) -> Self {
        self.predicate = Some(sql.into());
        self
    }

    /// Accepts the follow-up read.
    #[must_use]
    pub const fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Per-statement options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Declared types of bound values, by position.
    pub param_types: Vec<AbstractType>,
    /// Declared types of result columns, by name. Other columns use the server's type.
    pub column_types: HashMap<String, AbstractType>,
    /// `RETURNING` request.
    pub returning: Option<ReturningRequest>,
}

impl ExecuteOptions {
    /// No declared types, no `RETURNING`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the types of bound values.
    #[must_use]
    pub fn param_types(mut self, types: impl Into<Vec<AbstractType>>) -> Self {
        self.param_types = types.into();
        self
    }

    /// Declares the type of result column `name`.
    #[must_use]
    pub fn column_type(mut self, name: impl Into<String>, ty: AbstractType) -> Self {
        self.column_types.insert(name.into(), ty);
        self
    }

    /// Requests rows back from a write.
    #[must_use]
    pub fn returning(mut self, request: ReturningRequest) -> Self {
        self.returning = Some(request);
        self
    }
}

/// One MySQL session.
#[derive(Debug)]
pub struct MySqlBackend<T: Transport> {
    tx: TransactionManager<T>,
    dialect: MySqlDialect,
    config: MySqlConfig,
}

impl<T: Transport> MySqlBackend<T> {
    /// Prepares the session and binds the dialect to the server version.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unreachable server, a failing session setup
    /// statement, or an undetectable version without a fallback.
    pub async fn connect(mut transport: T, config: MySqlConfig) -> Result<Self> {
        config.validate()?;
        transport.ping().await?;

        let mut setup = vec![match &config.collation {
            Some(collation) => format!("SET NAMES {} COLLATE {collation}", config.charset),
            None => format!("SET NAMES {}", config.charset),
        }];
        if let Some(command) = &config.init_command {
            setup.push(command.clone());
        }
        if let Some(tz) = &config.timezone {
            setup.push(format!("SET time_zone = {}", quote_literal(tz)));
        }
        setup.push(format!("SET autocommit = {}", u8::from(config.autocommit)));
        for sql in &setup {
            debug!(sql = %sql, "Session setup");
            transport.execute(sql, &[]).await?;
        }

        let version = match config.server_version {
            Some(version) => version,
            None => detect_version(&mut transport, config.fallback_version).await?,
        };
        let mut options = config.dialect_options()?;
        if let Some(style) = transport.placeholder_style() {
            if style != options.placeholder_style {
                debug!(
                    configured = ?options.placeholder_style,
                    driver = ?style,
                    "Using the driver's placeholder style"
                );
            }
            options.placeholder_style = style;
        }
        let dialect = MySqlDialect::with_options(version, options);
        let mut tx = TransactionManager::new(transport);
        tx.set_isolation_level(config.isolation_level)?;

        info!(version = %version, host = %config.host, "Connected to MySQL");
        Ok(Self {
            tx,
            dialect,
            config,
        })
    }

    /// The bound dialect.
    pub const fn dialect(&self) -> &MySqlDialect {
        &self.dialect
    }

    /// The session configuration.
    pub const fn config(&self) -> &MySqlConfig {
        &self.config
    }

    /// The bound server version.
    pub const fn version(&self) -> ServerVersion {
        self.dialect.version()
    }

    /// Capability set of the bound version.
    pub const fn capabilities(&self) -> &Capabilities {
        self.dialect.capabilities()
    }

    /// The transaction manager.
    pub const fn transaction(&self) -> &TransactionManager<T> {
        &self.tx
    }

    /// The underlying transport.
    pub const fn connection(&self) -> &T {
        self.tx.connection()
    }

    /// Checks that the session is alive.
    pub async fn ping(&mut self) -> Result<()> {
        self.tx.connection_mut().ping().await?;
        Ok(())
    }

    fn log_statement(&self, sql: &str, params: usize) {
        if self.config.log_queries {
            info!(sql, params, "Executing statement");
        } else {
            debug!(sql, params, "Executing statement");
        }
    }

    /// Builds and runs one statement.
    ///
    /// # Errors
    ///
    /// Fails on a placeholder count mismatch, a value that cannot be converted, a server
    /// error, or a `RETURNING` request without `force`.
    pub async fn execute(
        &mut self,
        template: &str,
        params: Vec<Param>,
        options: &ExecuteOptions,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        if let Some(request) = options.returning.as_ref().filter(|r| !r.force) {
            let columns: Vec<&str> = request.columns.iter().map(String::as_str).collect();
            self.dialect.returning_handler().render(&columns)?;
        }

        let built = self.dialect.build(template, params)?;
        let wire = self
            .dialect
            .value_mapper()
            .to_wire_all(&built.params, &options.param_types)?;
        let kind = StatementKind::classify(&built.sql);
        // Planned up front so an impossible read-back fails before the write.
        let read_back = match &options.returning {
            Some(request) if !kind.returns_rows() => {
                Some(self.plan_read_back(&built, kind, request)?)
            }
            _ => None,
        };
        self.log_statement(&built.sql, wire.len());

        if kind.returns_rows() {
            let rows = self.tx.connection_mut().query(&built.sql, &wire).await?;
            let rows = self.decode(rows, &options.column_types)?;
            return Ok(QueryResult {
                affected_rows: rows.len() as u64,
                rows: Some(rows),
                last_insert_id: None,
                duration: started.elapsed(),
            });
        }

        let mut rows = None;
        if let Some(plan) = read_back.as_ref().filter(|plan| plan.run_before) {
            rows = Some(self.read_back(plan, &options.column_types).await?);
        }
        let outcome = self.tx.connection_mut().execute(&built.sql, &wire).await?;
        self.commit_if_manual().await?;
        if let Some(plan) = read_back.as_ref().filter(|plan| !plan.run_before) {
            rows = Some(self.read_back(plan, &options.column_types).await?);
        }
        Ok(QueryResult {
            rows,
            affected_rows: outcome.affected_rows,
            last_insert_id: outcome.last_insert_id,
            duration: started.elapsed(),
        })
    }

    /// Runs one template once per parameter set, in order.
    ///
    /// Every set is built and converted before anything is sent.
    pub async fn execute_many(
        &mut self,
        template: &str,
        param_sets: Vec<Vec<Param>>,
    ) -> Result<QueryResult> {
        let started = Instant::now();
        let mut statements = Vec::with_capacity(param_sets.len());
        for params in param_sets {
            let built = self.dialect.build(template, params)?;
            let wire = self.dialect.value_mapper().to_wire_all(&built.params, &[])?;
            statements.push((built.sql, wire));
        }
        let Some((first_sql, _)) = statements.first() else {
            return Ok(QueryResult::default());
        };
        let first_sql = first_sql.clone();
        self.log_statement(&first_sql, statements.len());

        let outcome = if statements.iter().all(|(sql, _)| *sql == first_sql) {
            let batches: Vec<_> = statements.into_iter().map(|(_, wire)| wire).collect();
            self.tx
                .connection_mut()
                .execute_batch(&first_sql, &batches)
                .await?
        } else {
            // Raw expressions made the statements differ.
            let mut total = ExecOutcome::default();
            for (sql, wire) in &statements {
                let outcome = self.tx.connection_mut().execute(sql, wire).await?;
                total.affected_rows += outcome.affected_rows;
                total.last_insert_id = outcome.last_insert_id.or(total.last_insert_id);
            }
            total
        };
        self.commit_if_manual().await?;

        Ok(QueryResult {
            rows: None,
            affected_rows: outcome.affected_rows,
            last_insert_id: outcome.last_insert_id,
            duration: started.elapsed(),
        })
    }

    /// Runs a query and returns every row.
    pub async fn fetch_all(&mut self, template: &str, params: Vec<Param>) -> Result<Vec<Row>> {
        Ok(self
            .execute(template, params, &ExecuteOptions::default())
            .await?
            .into_rows())
    }

    /// Runs a query and returns its first row.
    pub async fn fetch_one(&mut self, template: &str, params: Vec<Param>) -> Result<Option<Row>> {
        Ok(self.fetch_all(template, params).await?.into_iter().next())
    }

    /// Inserts one row. `table` may be schema-qualified.
    pub async fn insert(&mut self, table: &str, values: Vec<(&str, Param)>) -> Result<QueryResult> {
        let (columns, params): (Vec<_>, Vec<_>) = values.into_iter().unzip();
        let template = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_qualified(table),
            columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["%s"; params.len()].join(", ")
        );
        self.execute(&template, params, &ExecuteOptions::default())
            .await
    }

    /// Updates the rows matching `where_clause`, a template fragment with its own params.
    pub async fn update(
        &mut self,
        table: &str,
        values: Vec<(&str, Param)>,
        where_clause: &str,
        where_params: Vec<Param>,
    ) -> Result<QueryResult> {
        let (columns, mut params): (Vec<_>, Vec<_>) = values.into_iter().unzip();
        let assignments = columns
            .iter()
            .map(|c| format!("{} = %s", quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let template = format!(
            "UPDATE {} SET {assignments} WHERE {where_clause}",
            quote_qualified(table)
        );
        params.extend(where_params);
        self.execute(&template, params, &ExecuteOptions::default())
            .await
    }

    /// Starts a transaction or a nested level.
    pub async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        self.tx.begin(isolation).await
    }

    /// Commits the innermost level.
    pub async fn commit(&mut self) -> Result<()> {
        self.tx.commit().await
    }

    /// Rolls back the innermost level.
    pub async fn rollback(&mut self) -> Result<()> {
        self.tx.rollback().await
    }

    /// Creates a named savepoint.
    pub async fn savepoint(&mut self, name: &str) -> Result<Savepoint> {
        self.tx.savepoint(name).await
    }

    /// Releases a named savepoint.
    pub async fn release(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.tx.release(savepoint).await
    }

    /// Rolls back to a named savepoint.
    pub async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.tx.rollback_to(savepoint).await
    }

    /// Returns whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_active()
    }

    /// Changes the isolation level of the next transaction.
    pub fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<()> {
        self.tx.set_isolation_level(level)
    }

    fn has_open_transaction(&self) -> bool {
        matches!(
            self.tx.state(),
            TransactionState::Active | TransactionState::Failed
        )
    }

    /// Ends the session, rolling back whatever is still open, and returns the transport.
    pub async fn close(mut self) -> T {
        if self.has_open_transaction() {
            warn!(depth = self.tx.depth(), "Closing with an open transaction, rolling back");
        }
        // A failed rollback moves to FAILED, whose rollback always completes.
        while self.has_open_transaction() {
            if let Err(err) = self.tx.rollback().await {
                warn!(error = %err, "Rollback on close failed");
            }
        }
        self.tx.into_inner()
    }

    async fn commit_if_manual(&mut self) -> Result<()> {
        if self.config.autocommit || self.tx.is_active() {
            return Ok(());
        }
        debug!("COMMIT (autocommit off)");
        self.tx.connection_mut().execute("COMMIT", &[]).await?;
        Ok(())
    }

    fn plan_read_back(
        &self,
        built: &BuiltStatement,
        kind: StatementKind,
        request: &ReturningRequest,
    ) -> Result<FallbackPlan> {
        let write = match kind {
            StatementKind::Insert | StatementKind::Replace => WriteKind::Insert,
            StatementKind::Delete => WriteKind::Delete,
            _ => WriteKind::Update,
        };
        let table = statement::table_name(&built.sql).ok_or_else(|| {
            NotSupportedError::engine(
                Feature::Returning,
                format!("Cannot find the written table in '{}'", built.sql),
            )
        })?;
        let columns: Vec<&str> = request.columns.iter().map(String::as_str).collect();
        Ok(self.dialect.returning_handler().fallback_plan(
            write,
            &table,
            &columns,
            &request.primary_key,
            request.predicate.as_deref(),
        )?)
    }

    async fn read_back(
        &mut self,
        plan: &FallbackPlan,
        declared: &HashMap<String, AbstractType>,
    ) -> Result<Vec<Row>> {
        warn!(
            select = %plan.select,
            before_write = plan.run_before,
            "RETURNING emulated with a separate read"
        );
        let rows = self.tx.connection_mut().query(&plan.select, &[]).await?;
        self.decode(rows, declared)
    }

    fn decode(&self, set: RowSet, declared: &HashMap<String, AbstractType>) -> Result<Vec<Row>> {
        let mapper = self.dialect.value_mapper();
        set.rows
            .into_iter()
            .map(|values| {
                let columns = set
                    .columns
                    .iter()
                    .zip(values)
                    .map(|(meta, value)| {
                        let value = match declared.get(&meta.name) {
                            Some(ty) => mapper.from_wire(value, *ty)?,
                            None => mapper.decode_column(value, meta)?,
                        };
                        Ok((meta.name.clone(), value))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Row::from_columns(columns))
            })
            .collect()
    }
}

async fn detect_version<T: Transport>(
    transport: &mut T,
    fallback: Option<ServerVersion>,
) -> Result<ServerVersion> {
    let detected = match transport.query("SELECT VERSION()", &[]).await {
        Ok(rows) => match rows.rows.first().and_then(|row| row.first()) {
            Some(WireValue::Text(raw)) => ServerVersion::parse(raw),
            _ => Err(DialectError::InvalidVersion(String::from(
                "SELECT VERSION() returned no text",
            ))),
        },
        Err(err) => Err(err.into()),
    };
    match (detected, fallback) {
        (Ok(version), _) => Ok(version),
        (Err(err), Some(fallback)) => {
            warn!(error = %err, fallback = %fallback, "Version detection failed, using fallback");
            Ok(fallback)
        }
        (Err(err), None) => Err(err),
    }
}
