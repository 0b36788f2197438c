//! Query logging and slow-query reporting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{Connection, QueryResult, RowStream};
use crate::error::{Result, SyncError};

/// Receives query lifecycle events.
pub trait QueryLogger: Send + Sync {
    /// Called before a statement runs.
    fn log_query(&self, sql: &str, parameters: &[Value]);

    /// Called when a statement fails.
    fn log_query_error(&self, error: &SyncError, sql: &str, parameters: &[Value]);

    /// Called after a statement ran longer than the configured threshold.
    fn log_query_slow(&self, elapsed: Duration, sql: &str, parameters: &[Value]);

    /// Called by the reconciliation engine for each schema operation.
    fn log_schema_build(&self, message: &str);
}

/// Logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingQueryLogger;

fn render(parameters: &[Value]) -> String {
    Value::from(parameters.to_vec()).to_string()
}

impl QueryLogger for TracingQueryLogger {
    fn log_query(&self, sql: &str, parameters: &[Value]) {
        if parameters.is_empty() {
            debug!(sql = %sql, "Executing SQL");
        } else {
            debug!(sql = %sql, parameters = %render(parameters), "Executing SQL");
        }
    }

    fn log_query_error(&self, error: &SyncError, sql: &str, parameters: &[Value]) {
        error!(sql = %sql, parameters = %render(parameters), error = %error, "Query failed");
    }

    fn log_query_slow(&self, elapsed: Duration, sql: &str, parameters: &[Value]) {
        warn!(
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            sql = %sql,
            parameters = %render(parameters),
            "Query is slow"
        );
    }

    fn log_schema_build(&self, message: &str) {
        info!("{message}");
    }
}

/// Wraps a connection with logging, slow-query reporting and error context.
pub struct LoggingConnection {
    inner: Arc<dyn Connection>,
    logger: Arc<dyn QueryLogger>,
    max_query_execution_time: Option<Duration>,
}

impl LoggingConnection {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(
        inner: Arc<dyn Connection>,
        logger: Arc<dyn QueryLogger>,
        max_query_execution_time: Option<Duration>,
    ) -> Self {
        Self {
            inner,
            logger,
            max_query_execution_time,
        }
    }
}

#[async_trait]
impl Connection for LoggingConnection {
    async fn execute(&self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.logger.log_query(sql, parameters);
        let started = Instant::now();
        let result = self.inner.execute(sql, parameters).await;
        let elapsed = started.elapsed();

        // Reported after the fact; the statement is never cancelled.
        if let Some(max) = self.max_query_execution_time {
            if elapsed > max {
                self.logger.log_query_slow(elapsed, sql, parameters);
            }
        }

        result.map_err(|err| {
            self.logger.log_query_error(&err, sql, parameters);
            SyncError::query_failed(sql, parameters, err)
        })
    }

    async fn stream(&self, sql: &str, parameters: &[Value]) -> Result<RowStream> {
        self.logger.log_query(sql, parameters);
        self.inner.stream(sql, parameters).await
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.inner.set_autocommit(enabled).await
    }

    async fn release(&self) -> Result<()> {
        self.inner.release().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl QueryLogger for Recorder {
        fn log_query(&self, sql: &str, _: &[Value]) {
            self.events.lock().unwrap().push(format!("query {sql}"));
        }
        fn log_query_error(&self, _: &SyncError, sql: &str, _: &[Value]) {
            self.events.lock().unwrap().push(format!("error {sql}"));
        }
        fn log_query_slow(&self, _: Duration, sql: &str, _: &[Value]) {
            self.events.lock().unwrap().push(format!("slow {sql}"));
        }
        fn log_schema_build(&self, message: &str) {
            self.events.lock().unwrap().push(message.to_string());
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Connection for Sleepy {
        async fn execute(&self, sql: &str, _: &[Value]) -> Result<QueryResult> {
            if sql == "FAIL" {
                return Err(SyncError::Driver("nope".into()));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(QueryResult::default())
        }
    }

    #[tokio::test]
    async fn test_slow_queries_are_reported_not_cancelled() {
        let recorder = Arc::new(Recorder::default());
        let conn = LoggingConnection::new(
            Arc::new(Sleepy),
            recorder.clone(),
            Some(Duration::from_millis(1)),
        );
        conn.execute("SELECT pg_sleep(1)", &[]).await.unwrap();
        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec!["query SELECT pg_sleep(1)", "slow SELECT pg_sleep(1)"]
        );
    }

    #[tokio::test]
    async fn test_errors_carry_sql() {
        let recorder = Arc::new(Recorder::default());
        let conn = LoggingConnection::new(Arc::new(Sleepy), recorder.clone(), None);
        let err = conn.execute("FAIL", &[Value::from(1)]).await.unwrap_err();
        match err {
            SyncError::QueryFailed {
                sql, parameters, ..
            } => {
                assert_eq!(sql, "FAIL");
                assert_eq!(parameters, "[1]");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(recorder
            .events
            .lock()
            .unwrap()
            .contains(&"error FAIL".to_string()));
    }
}
