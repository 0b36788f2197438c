//! Scripted connection used by unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RunnerOptions;
use crate::connection::{Connection, QueryResult, Row};
use crate::error::{Result, SyncError};
use crate::introspect::Catalog;
use crate::runner::QueryRunner;

/// Runner over a shared scripted connection.
pub fn runner(
    conn: &Arc<ScriptedConnection>,
    dialect: impl Catalog + 'static,
    options: RunnerOptions,
) -> QueryRunner {
    QueryRunner::with_connection(
        Arc::clone(conn) as Arc<dyn Connection>,
        Arc::new(dialect),
        options,
    )
}

/// Answers queries by substring match and records everything it runs.
#[derive(Default)]
pub struct ScriptedConnection {
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    failures: Mutex<Vec<String>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ScriptedConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries containing `needle` return `rows` (JSON objects).
    pub fn respond(self, needle: &str, rows: Value) -> Self {
        let rows = rows
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| r.as_object().cloned())
            .collect();
        self.responses
            .lock()
            .unwrap()
            .push((needle.to_string(), rows));
        self
    }

    /// Statements containing `needle` fail.
    pub fn fail_on(self, needle: &str) -> Self {
        self.failures.lock().unwrap().push(needle.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    /// Executed DDL and DML, without catalog reads and transaction control.
    pub fn statements(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| {
                let head = sql.split_whitespace().next().unwrap_or_default();
                !matches!(head, "SELECT" | "START" | "COMMIT" | "ROLLBACK")
                    && !sql.starts_with("SET TRANSACTION")
            })
            .collect()
    }

    pub fn parameters(&self, index: usize) -> Vec<Value> {
        self.log.lock().unwrap()[index].1.clone()
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn execute(&self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), parameters.to_vec()));
        if self.failures.lock().unwrap().iter().any(|n| sql.contains(n)) {
            return Err(SyncError::Driver(format!("scripted failure: {sql}")));
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .find(|(needle, _)| sql.contains(needle))
            .map(|(_, rows)| QueryResult::rows(rows.clone()))
            .unwrap_or_default())
    }
}
