//! Connections: the `execute(query, params) -> rows` contract the engine runs on.
//!
//! A [`Connector`] hands out one [`Connection`] per query runner. The
//! sqlx-backed implementation lives in [`pool`]; [`logging`] and [`queue`]
//! wrap any connection with query logging and FIFO serialization.

pub mod logging;
pub mod queue;
pub mod pool;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

/// A stream of rows.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// Outcome of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Returned rows.
    pub records: Vec<Row>,
    /// Affected row count, when the driver reports one.
    pub affected: Option<u64>,
    /// Identity produced by an INSERT, when known.
    pub last_insert_id: Option<i64>,
}

impl QueryResult {
    /// Creates a result holding rows.
    #[must_use]
    pub const fn rows(records: Vec<Row>) -> Self {
        Self {
            records,
            affected: None,
            last_insert_id: None,
        }
    }

    /// Creates a result holding an affected count.
    #[must_use]
    pub const fn affected(count: u64) -> Self {
        Self {
            records: Vec::new(),
            affected: Some(count),
            last_insert_id: None,
        }
    }
}

/// A single physical connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Executes one statement.
    async fn execute(&self, sql: &str, parameters: &[Value]) -> Result<QueryResult>;

    /// Streams the rows of one query.
    async fn stream(&self, _sql: &str, _parameters: &[Value]) -> Result<RowStream> {
        Err(SyncError::unsupported(
            "this connection",
            "streaming",
            Some("query"),
        ))
    }

    /// Switches driver-level autocommit. Most drivers do not need it.
    async fn set_autocommit(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    /// Returns the connection to its pool.
    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Hands out connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Acquires a connection.
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// Typed access to catalog rows.
pub trait RowExt {
    /// Returns a column as text; numbers and booleans are rendered.
    fn text(&self, key: &str) -> Option<String>;

    /// Returns a column as an integer; numeric strings are parsed.
    fn int(&self, key: &str) -> Option<i64>;

    /// Returns a column as a flag (`true`, `1`, `YES`, `TRUE`, `t`).
    fn flag(&self, key: &str) -> bool;
}

impl RowExt for Row {
    fn text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            Some(Value::String(s)) => {
                matches!(s.to_ascii_uppercase().as_str(), "YES" | "TRUE" | "T" | "1")
            }
            _ => false,
        }
    }
}

/// Returns true for statements that produce rows.
#[must_use]
pub fn returns_rows(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        head.as_str(),
        "SELECT" | "WITH" | "SHOW" | "VALUES" | "EXPLAIN" | "PRAGMA" | "DESCRIBE"
    ) || sql.to_ascii_uppercase().contains(" RETURNING ")
}
