#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use oxide_sync::connection::{Connection, QueryResult, Row};
use oxide_sync::prelude::*;

/// In-process connection: answers catalog queries from canned rows and
/// records every statement it is given.
#[derive(Default)]
pub struct FakeDatabase {
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    failures: Mutex<Vec<String>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries containing `needle` return `rows`, a JSON array of objects.
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

    pub fn parameters(&self, index: usize) -> Vec<Value> {
        self.log.lock().unwrap()[index].1.clone()
    }

    /// Executed statements other than catalog reads and transaction control.
    pub fn statements(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| {
                let head = sql.split_whitespace().next().unwrap_or_default();
                !matches!(head, "SELECT" | "START" | "COMMIT" | "ROLLBACK")
            })
            .collect()
    }
}

#[async_trait]
impl Connection for FakeDatabase {
    async fn execute(&self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_string(), parameters.to_vec()));
        if self.failures.lock().unwrap().iter().any(|n| sql.contains(n)) {
            return Err(SyncError::Driver(format!("refused: {sql}")));
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .find(|(needle, _)| sql.contains(needle))
            .map(|(_, rows)| QueryResult::rows(rows.clone()))
            .unwrap_or_default())
    }
}

pub fn postgres(db: &Arc<FakeDatabase>) -> QueryRunner {
    QueryRunner::with_connection(
        Arc::clone(db) as Arc<dyn Connection>,
        Arc::new(PostgresDialect::new()),
        RunnerOptions::new().with_schema("public"),
    )
}

pub fn mysql(db: &Arc<FakeDatabase>) -> QueryRunner {
    QueryRunner::with_connection(
        Arc::clone(db) as Arc<dyn Connection>,
        Arc::new(MySqlDialect::new()),
        RunnerOptions::new().with_database("app"),
    )
}

pub fn hana(db: &Arc<FakeDatabase>) -> QueryRunner {
    QueryRunner::with_connection(
        Arc::clone(db) as Arc<dyn Connection>,
        Arc::new(HanaDialect::new()),
        RunnerOptions::new().with_schema("APP"),
    )
}
