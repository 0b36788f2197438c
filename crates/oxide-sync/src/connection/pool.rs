//! sqlx-backed connections over `sqlx::Any` (Postgres, MySQL, SQLite).

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row as _};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use super::{returns_rows, Connection, Connector, QueryResult, Row, RowStream};
use crate::error::{Result, SyncError};

/// Rows buffered between a streaming query and its consumer.
const STREAM_BUFFER: usize = 64;

/// Acquires connections from an `AnyPool`.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    pool: AnyPool,
}

impl SqlxConnector {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `url`.
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Returns the pool.
    #[must_use]
    pub const fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = self.pool.acquire().await?;
        debug!("Acquired pooled connection");
        Ok(Box::new(SqlxConnection {
            inner: Arc::new(Mutex::new(Some(conn))),
        }))
    }
}

/// One pooled connection; `None` once released.
pub struct SqlxConnection {
    inner: Arc<Mutex<Option<PoolConnection<Any>>>>,
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    parameters: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for value in parameters {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn decode_value(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map_or(Value::Null, Value::from);
    }
    if let Ok(Some(bytes)) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Value::from(String::from_utf8_lossy(&bytes).into_owned());
    }
    Value::Null
}

fn decode_row(row: &AnyRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| (column.name().to_string(), decode_value(row, i)))
        .collect()
}

#[async_trait]
impl Connection for SqlxConnection {
    async fn execute(&self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        let mut guard = self.inner.lock().await;
        let conn = guard.as_mut().ok_or(SyncError::RunnerReleased)?;
        let query = bind_all(sqlx::query(sql), parameters);

        if returns_rows(sql) {
            let rows = query.fetch_all(&mut **conn).await?;
            Ok(QueryResult::rows(rows.iter().map(decode_row).collect()))
        } else {
            let done = query.execute(&mut **conn).await?;
            Ok(QueryResult {
                records: Vec::new(),
                affected: Some(done.rows_affected()),
                last_insert_id: done.last_insert_id(),
            })
        }
    }

    async fn stream(&self, sql: &str, parameters: &[Value]) -> Result<RowStream> {
        let inner = Arc::clone(&self.inner);
        let sql = sql.to_string();
        let parameters = parameters.to_vec();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        // The connection stays locked until the stream is drained, so
        // statements issued meanwhile queue up behind it.
        tokio::spawn(async move {
            let mut guard = inner.lock_owned().await;
            let Some(conn) = guard.as_mut() else {
                let _ = tx.send(Err(SyncError::RunnerReleased)).await;
                return;
            };
            let query = bind_all(sqlx::query(&sql), &parameters);
            let mut rows = query.fetch(&mut **conn);
            while let Some(item) = rows.next().await {
                let item = item.map(|r| decode_row(&r)).map_err(SyncError::from);
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn release(&self) -> Result<()> {
        // Dropping the pool connection returns it to the pool.
        self.inner.lock().await.take();
        Ok(())
    }
}
