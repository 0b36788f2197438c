//! The query runner: one connection, its transaction state, and the schema
//! cache every reconciliation operation works against.
//!
//! A runner moves through `idle -> connected -> released`. It connects
//! lazily on first use and resolves the default database or schema once at
//! that point. Every statement goes through a [`LoggingConnection`], and
//! dialects that need it get a [`SerialQueue`] on top.

pub mod cache;
pub mod hooks;

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};

pub use cache::{SchemaCache, SchemaSnapshot};
pub use hooks::{TransactionEvent, TransactionSubscriber};

use crate::config::RunnerOptions;
use crate::connection::logging::{LoggingConnection, QueryLogger, TracingQueryLogger};
use crate::connection::queue::SerialQueue;
use crate::connection::{Connection, Connector, QueryResult, RowStream};
use crate::context::SchemaContext;
use crate::dialect::{DdlContext, DialectKind, IsolationLevel};
use crate::error::{Result, SyncError};
use crate::introspect::Catalog;
use crate::metadata::MetadataTable;
use crate::naming::{DefaultNamingStrategy, NamingStrategy};
use crate::schema::{Table, View};
use crate::statement::{Changeset, Statement};

/// Lifecycle state of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No connection acquired yet.
    Idle,
    /// Holding a connection.
    Connected,
    /// Released; every further call fails.
    Released,
}

enum Source {
    Connector(Arc<dyn Connector>),
    Connection(Arc<dyn Connection>),
}

/// Runs queries and schema operations on one connection.
pub struct QueryRunner {
    pub(crate) dialect: Arc<dyn Catalog>,
    source: Source,
    connection: Option<Arc<dyn Connection>>,
    released: bool,
    in_transaction: bool,
    pub(crate) naming: Arc<dyn NamingStrategy>,
    logger: Arc<dyn QueryLogger>,
    subscribers: Vec<Arc<dyn TransactionSubscriber>>,
    pub(crate) context: SchemaContext,
    pub(crate) metadata: MetadataTable,
    max_query_execution_time: Option<Duration>,
    pub(crate) cache: SchemaCache,
    sql_in_memory: bool,
    memory: Changeset,
}

impl QueryRunner {
    /// Creates a runner that acquires its connection from `connector` on
    /// first use.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        dialect: Arc<dyn Catalog>,
        options: RunnerOptions,
    ) -> Self {
        Self::build(Source::Connector(connector), dialect, options)
    }

    /// Creates a runner over an already acquired connection.
    #[must_use]
    pub fn with_connection(
        connection: Arc<dyn Connection>,
        dialect: Arc<dyn Catalog>,
        options: RunnerOptions,
    ) -> Self {
        Self::build(Source::Connection(connection), dialect, options)
    }

    fn build(source: Source, dialect: Arc<dyn Catalog>, options: RunnerOptions) -> Self {
        Self {
            dialect,
            source,
            connection: None,
            released: false,
            in_transaction: false,
            naming: Arc::new(DefaultNamingStrategy::new()),
            logger: Arc::new(TracingQueryLogger),
            subscribers: Vec::new(),
            context: options.schema_context(),
            metadata: MetadataTable::new(options.metadata_table),
            max_query_execution_time: options.max_query_execution_time,
            cache: SchemaCache::new(),
            sql_in_memory: false,
            memory: Changeset::new(),
        }
    }

    /// Replaces the naming strategy.
    #[must_use]
    pub fn with_naming_strategy(mut self, naming: Arc<dyn NamingStrategy>) -> Self {
        self.naming = naming;
        self
    }

    /// Replaces the query logger. Takes effect on the next connection.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Registers a transaction subscriber.
    pub fn subscribe(&mut self, subscriber: Arc<dyn TransactionSubscriber>) {
        self.subscribers.push(subscriber);
    }

    /// The dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Catalog {
        self.dialect.as_ref()
    }

    /// The resolved schema context.
    #[must_use]
    pub const fn context(&self) -> &SchemaContext {
        &self.context
    }

    /// The view metadata table.
    #[must_use]
    pub const fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// The schema cache.
    #[must_use]
    pub const fn schema_cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RunnerState {
        if self.released {
            RunnerState::Released
        } else if self.connection.is_some() {
            RunnerState::Connected
        } else {
            RunnerState::Idle
        }
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub const fn is_transaction_active(&self) -> bool {
        self.in_transaction
    }

    pub(crate) fn ddl(&self) -> DdlContext<'_> {
        DdlContext {
            naming: self.naming.as_ref(),
            schema: &self.context,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.released {
            return Err(SyncError::RunnerReleased);
        }
        Ok(())
    }

    /// Acquires the connection if needed and returns it.
    pub(crate) async fn connect(&mut self) -> Result<Arc<dyn Connection>> {
        self.ensure_open()?;
        if let Some(conn) = &self.connection {
            return Ok(Arc::clone(conn));
        }

        let raw: Arc<dyn Connection> = match &self.source {
            Source::Connector(connector) => Arc::from(connector.connect().await?),
            Source::Connection(conn) => Arc::clone(conn),
        };
        let logged: Arc<dyn Connection> = Arc::new(LoggingConnection::new(
            raw,
            Arc::clone(&self.logger),
            self.max_query_execution_time,
        ));
        let conn: Arc<dyn Connection> = if self.dialect.features().serialized_queries {
            Arc::new(SerialQueue::spawn(logged))
        } else {
            logged
        };
        self.connection = Some(Arc::clone(&conn));
        debug!(dialect = self.dialect.name(), "Connected");

        if self.dialect.default_namespace(&self.context).is_none() {
            if self.dialect.features().schemas {
                self.context.schema = self.dialect.current_schema(conn.as_ref()).await?;
            } else {
                self.context.database = self.dialect.current_database(conn.as_ref()).await?;
            }
        }
        Ok(conn)
    }

    /// Releases the connection. Further calls fail with
    /// [`SyncError::RunnerReleased`]; releasing twice is a no-op.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.in_transaction = false;
        match self.connection.take() {
            Some(conn) => conn.release().await,
            None => Ok(()),
        }
    }

    /// Executes one statement.
    pub async fn query(&mut self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        let conn = self.connect().await?;
        conn.execute(sql, parameters).await
    }

    /// Streams the rows of one query. End and failure are observed through
    /// the stream itself.
    pub async fn stream(&mut self, sql: &str, parameters: &[Value]) -> Result<RowStream> {
        let conn = self.connect().await?;
        conn.stream(sql, parameters).await
    }

    async fn broadcast(&self, event: TransactionEvent) -> Result<()> {
        try_join_all(self.subscribers.iter().map(|s| s.on_transaction(event))).await?;
        Ok(())
    }

    /// Opens a transaction.
    pub async fn start_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        self.ensure_open()?;
        if self.in_transaction {
            return Err(SyncError::TransactionAlreadyStarted);
        }
        let conn = self.connect().await?;

        self.broadcast(TransactionEvent::BeforeStart).await?;
        conn.set_autocommit(false).await?;
        for sql in self.dialect.start_transaction_sql(isolation) {
            if let Err(err) = conn.execute(&sql, &[]).await {
                conn.set_autocommit(true).await?;
                return Err(err);
            }
        }
        self.in_transaction = true;
        self.broadcast(TransactionEvent::AfterStart).await
    }

    /// Commits the open transaction.
    pub async fn commit_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.in_transaction {
            return Err(SyncError::TransactionNotStarted);
        }
        let conn = self.connect().await?;

        self.broadcast(TransactionEvent::BeforeCommit).await?;
        conn.execute(self.dialect.commit_sql(), &[]).await?;
        self.in_transaction = false;
        conn.set_autocommit(true).await?;
        self.broadcast(TransactionEvent::AfterCommit).await
    }

    /// Rolls the open transaction back.
    pub async fn rollback_transaction(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.in_transaction {
            return Err(SyncError::TransactionNotStarted);
        }
        let conn = self.connect().await?;

        self.broadcast(TransactionEvent::BeforeRollback).await?;
        let outcome = conn.execute(self.dialect.rollback_sql(), &[]).await;
        self.in_transaction = false;
        conn.set_autocommit(true).await?;
        outcome?;
        self.broadcast(TransactionEvent::AfterRollback).await
    }

    /// Runs the up statements of `changeset`, or records them while SQL
    /// memory is enabled.
    ///
    /// Inside an open transaction the statements just run and recovery is
    /// the caller's. Otherwise the batch gets its own transaction, except on
    /// MySQL where DDL commits implicitly: there the down statements of
    /// whatever already ran are replayed in reverse when a statement fails.
    pub async fn execute_queries(&mut self, changeset: Changeset) -> Result<()> {
        if self.sql_in_memory {
            self.memory.extend(changeset);
            return Ok(());
        }
        if changeset.is_empty() {
            return Ok(());
        }
        if self.in_transaction {
            return self.run_all(&changeset.up).await;
        }
        if self.dialect.kind() == DialectKind::MySql {
            return self.run_compensated(&changeset).await;
        }

        self.start_transaction(None).await?;
        match self.run_all(&changeset.up).await {
            Ok(()) => self.commit_transaction().await,
            Err(err) => {
                if let Err(rollback) = self.rollback_transaction().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Runs the up statements outside any transaction, for statements such
    /// as `CREATE DATABASE` that refuse to run inside one.
    pub(crate) async fn execute_direct(&mut self, changeset: Changeset) -> Result<()> {
        if self.sql_in_memory {
            self.memory.extend(changeset);
            return Ok(());
        }
        self.run_all(&changeset.up).await
    }

    /// Hands out the recorded statements and leaves the memory empty.
    pub(crate) fn take_sql_memory(&mut self) -> Changeset {
        std::mem::take(&mut self.memory)
    }

    pub(crate) fn log_schema_build(&self, message: &str) {
        self.logger.log_schema_build(message);
    }

    async fn run_all(&mut self, statements: &[Statement]) -> Result<()> {
        let conn = self.connect().await?;
        for statement in statements {
            conn.execute(&statement.sql, &statement.parameters).await?;
        }
        Ok(())
    }

    async fn run_compensated(&mut self, changeset: &Changeset) -> Result<()> {
        let conn = self.connect().await?;
        for (done, statement) in changeset.up.iter().enumerate() {
            if let Err(err) = conn.execute(&statement.sql, &statement.parameters).await {
                for down in changeset.down[..done].iter().rev() {
                    if let Err(undo) = conn.execute(&down.sql, &down.parameters).await {
                        warn!(sql = %down.sql, error = %undo, "Could not undo statement");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Starts recording statements instead of running them.
    pub fn enable_sql_memory(&mut self) {
        self.sql_in_memory = true;
        self.memory = Changeset::new();
    }

    /// Stops recording and forgets what was recorded.
    pub fn disable_sql_memory(&mut self) {
        self.sql_in_memory = false;
        self.memory = Changeset::new();
    }

    /// Returns true while statements are recorded.
    #[must_use]
    pub const fn is_sql_memory_enabled(&self) -> bool {
        self.sql_in_memory
    }

    /// Statements recorded so far.
    #[must_use]
    pub const fn sql_memory(&self) -> &Changeset {
        &self.memory
    }

    /// Forgets recorded statements and keeps recording.
    pub fn clear_sql_memory(&mut self) {
        self.memory = Changeset::new();
    }

    /// Runs the recorded up statements in order.
    pub async fn execute_memory_up_sql(&mut self) -> Result<()> {
        let statements = self.memory.up.clone();
        for statement in &statements {
            self.query(&statement.sql, &statement.parameters).await?;
        }
        Ok(())
    }

    /// Runs the recorded down statements in reverse order.
    pub async fn execute_memory_down_sql(&mut self) -> Result<()> {
        let statements: Vec<Statement> = self.memory.rollback_order().cloned().collect();
        for statement in &statements {
            self.query(&statement.sql, &statement.parameters).await?;
        }
        Ok(())
    }

    /// Cache key of a table or view name.
    #[must_use]
    pub fn cache_key(&self, name: &str) -> String {
        self.dialect
            .resolve_path(&self.context, name)
            .display_in(self.dialect.default_namespace(&self.context))
    }

    /// Loads tables and stores them in the cache.
    pub async fn get_tables(&mut self, names: &[String]) -> Result<Vec<Table>> {
        let conn = self.connect().await?;
        let tables = self
            .dialect
            .load_tables(conn.as_ref(), &self.ddl(), names)
            .await?;
        let entries: Vec<(String, Table)> = tables
            .iter()
            .map(|t| (self.cache_key(&t.name), t.clone()))
            .collect();
        self.cache.update(|snapshot| {
            for (key, table) in entries {
                snapshot.put_table(key, table);
            }
        });
        Ok(tables)
    }

    /// Loads one table and stores it in the cache.
    pub async fn get_table(&mut self, name: &str) -> Result<Option<Table>> {
        Ok(self.get_tables(&[name.to_string()]).await?.into_iter().next())
    }

    /// Loads persisted views and stores them in the cache.
    pub async fn get_views(&mut self, names: &[String]) -> Result<Vec<View>> {
        let conn = self.connect().await?;
        let views = self
            .dialect
            .load_views(conn.as_ref(), &self.context, &self.metadata, names)
            .await?;
        let entries: Vec<(String, View)> = views
            .iter()
            .map(|v| (self.cache_key(&v.name), v.clone()))
            .collect();
        self.cache.update(|snapshot| {
            for (key, view) in entries {
                snapshot.put_view(key, view);
            }
        });
        Ok(views)
    }

    /// Loads one persisted view and stores it in the cache.
    pub async fn get_view(&mut self, name: &str) -> Result<Option<View>> {
        Ok(self.get_views(&[name.to_string()]).await?.into_iter().next())
    }

    /// Cached table, loading it on a miss.
    pub(crate) async fn cached_table(&mut self, name: &str) -> Result<Table> {
        if let Some(table) = self.cache.table(&self.cache_key(name)) {
            return Ok(table.clone());
        }
        self.get_table(name)
            .await?
            .ok_or_else(|| SyncError::TableNotFound(name.to_string()))
    }

    /// Cached view, loading it on a miss.
    pub(crate) async fn cached_view(&mut self, name: &str) -> Result<View> {
        if let Some(view) = self.cache.view(&self.cache_key(name)) {
            return Ok(view.clone());
        }
        self.get_view(name)
            .await?
            .ok_or_else(|| SyncError::ViewNotFound(name.to_string()))
    }

    /// Publishes `table` in place of the table cached as `previous_name`.
    pub(crate) fn replace_cached_table(&mut self, previous_name: &str, table: Table) {
        let old_key = self.cache_key(previous_name);
        let new_key = self.cache_key(&table.name);
        self.cache.update(|snapshot| {
            snapshot.remove_table(&old_key);
            snapshot.put_table(new_key, table);
        });
    }

    pub(crate) fn forget_cached_table(&mut self, name: &str) {
        let key = self.cache_key(name);
        self.cache.update(|snapshot| snapshot.remove_table(&key));
    }

    pub(crate) fn replace_cached_view(&mut self, view: View) {
        let key = self.cache_key(&view.name);
        self.cache.update(|snapshot| snapshot.put_view(key, view));
    }

    pub(crate) fn forget_cached_view(&mut self, name: &str) {
        let key = self.cache_key(name);
        self.cache.update(|snapshot| snapshot.remove_view(&key));
    }

    /// Names of every table in the default namespace.
    pub async fn table_names(&mut self) -> Result<Vec<String>> {
        let conn = self.connect().await?;
        self.dialect.table_names(conn.as_ref(), &self.context).await
    }

    /// Returns true if the table exists.
    pub async fn has_table(&mut self, name: &str) -> Result<bool> {
        let conn = self.connect().await?;
        self.dialect.has_table(conn.as_ref(), &self.context, name).await
    }

    /// Returns true if the table has the column.
    pub async fn has_column(&mut self, table: &str, column: &str) -> Result<bool> {
        let conn = self.connect().await?;
        self.dialect
            .has_column(conn.as_ref(), &self.context, table, column)
            .await
    }

    /// Returns true if the schema exists.
    pub async fn has_schema(&mut self, schema: &str) -> Result<bool> {
        let conn = self.connect().await?;
        self.dialect.has_schema(conn.as_ref(), schema).await
    }

    /// Returns true if the database exists.
    pub async fn has_database(&mut self, database: &str) -> Result<bool> {
        let conn = self.connect().await?;
        self.dialect.has_database(conn.as_ref(), database).await
    }

    /// Database the connection is using, as reported by the server.
    pub async fn current_database(&mut self) -> Result<Option<String>> {
        let conn = self.connect().await?;
        self.dialect.current_database(conn.as_ref()).await
    }

    /// Schema unqualified names resolve to, as reported by the server.
    pub async fn current_schema(&mut self) -> Result<Option<String>> {
        let conn = self.connect().await?;
        self.dialect.current_schema(conn.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::testing::ScriptedConnection;

    fn postgres(conn: &Arc<ScriptedConnection>) -> QueryRunner {
        QueryRunner::with_connection(
            Arc::clone(conn) as Arc<dyn Connection>,
            Arc::new(PostgresDialect::new()),
            RunnerOptions::new().with_schema("public"),
        )
    }

    fn changeset() -> Changeset {
        let mut changeset = Changeset::new();
        changeset.push("CREATE A", "DROP A");
        changeset.push("CREATE B", "DROP B");
        changeset.push("CREATE C", "DROP C");
        changeset
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<TransactionEvent>>,
    }

    #[async_trait]
    impl TransactionSubscriber for Recorder {
        async fn on_transaction(&self, event: TransactionEvent) -> Result<()> {
            tokio::task::yield_now().await;
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_transaction_state_machine() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = postgres(&conn);
        assert_eq!(runner.state(), RunnerState::Idle);

        assert!(matches!(
            runner.commit_transaction().await,
            Err(SyncError::TransactionNotStarted)
        ));
        runner
            .start_transaction(Some(IsolationLevel::Serializable))
            .await
            .unwrap();
        assert_eq!(runner.state(), RunnerState::Connected);
        assert!(matches!(
            runner.start_transaction(None).await,
            Err(SyncError::TransactionAlreadyStarted)
        ));
        runner.rollback_transaction().await.unwrap();
        assert!(!runner.is_transaction_active());

        runner.release().await.unwrap();
        assert_eq!(runner.state(), RunnerState::Released);
        assert!(matches!(
            runner.query("SELECT 1", &[]).await,
            Err(SyncError::RunnerReleased)
        ));
        assert_eq!(conn.executed().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_hooks_are_awaited_in_order() {
        let conn = Arc::new(ScriptedConnection::new());
        let recorder = Arc::new(Recorder::default());
        let mut runner = postgres(&conn);
        runner.subscribe(Arc::clone(&recorder) as Arc<dyn TransactionSubscriber>);

        runner.start_transaction(None).await.unwrap();
        assert_eq!(recorder.events.lock().unwrap().len(), 2);
        runner.commit_transaction().await.unwrap();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                TransactionEvent::BeforeStart,
                TransactionEvent::AfterStart,
                TransactionEvent::BeforeCommit,
                TransactionEvent::AfterCommit,
            ]
        );
    }

    #[tokio::test]
    async fn test_batch_gets_its_own_transaction() {
        let conn = Arc::new(ScriptedConnection::new().fail_on("CREATE B"));
        let mut runner = postgres(&conn);

        let err = runner.execute_queries(changeset()).await.unwrap_err();
        assert!(err.to_string().contains("CREATE B"));
        assert_eq!(
            conn.executed(),
            vec!["START TRANSACTION", "CREATE A", "CREATE B", "ROLLBACK"]
        );
        assert!(!runner.is_transaction_active());
    }

    #[tokio::test]
    async fn test_mysql_replays_downs_of_executed_statements() {
        let conn = Arc::new(ScriptedConnection::new().fail_on("CREATE C"));
        let mut runner = QueryRunner::with_connection(
            Arc::clone(&conn) as Arc<dyn Connection>,
            Arc::new(MySqlDialect::new()),
            RunnerOptions::new().with_database("app"),
        );

        assert!(runner.execute_queries(changeset()).await.is_err());
        assert_eq!(
            conn.executed(),
            vec!["CREATE A", "CREATE B", "CREATE C", "DROP B", "DROP A"]
        );
    }

    #[tokio::test]
    async fn test_sql_memory_records_instead_of_running() {
        let conn = Arc::new(ScriptedConnection::new());
        let mut runner = postgres(&conn);

        runner.enable_sql_memory();
        runner.execute_queries(changeset()).await.unwrap();
        assert!(conn.executed().is_empty());
        assert_eq!(runner.sql_memory().len(), 3);

        runner.execute_memory_down_sql().await.unwrap();
        assert_eq!(conn.executed(), vec!["DROP C", "DROP B", "DROP A"]);

        runner.disable_sql_memory();
        assert!(runner.sql_memory().is_empty());
    }

    #[tokio::test]
    async fn test_lazy_connect_resolves_default_schema() {
        let conn = Arc::new(
            ScriptedConnection::new().respond("current_schema()", serde_json::json!([{"name": "app"}])),
        );
        let mut runner = QueryRunner::with_connection(
            Arc::clone(&conn) as Arc<dyn Connection>,
            Arc::new(PostgresDialect::new()),
            RunnerOptions::new(),
        );
        runner.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(runner.context().schema.as_deref(), Some("app"));
        assert_eq!(runner.cache_key("app.user"), "user");
        assert_eq!(runner.cache_key("other.user"), "other.user");
    }
}
