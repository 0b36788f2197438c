//! FIFO statement queue for drivers that need strict per-connection ordering.
//!
//! One worker task owns the connection and drains jobs in submission order.
//! Every job carries the autocommit mode that was current when it was
//! enqueued, and INSERTs are followed by an identity fetch that runs before
//! the next job is picked up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{Connection, QueryResult, RowExt};
use crate::error::{Result, SyncError};

/// Query fetching the identity generated by the last INSERT.
pub const IDENTITY_SQL: &str =
    "SELECT CURRENT_IDENTITY_VALUE() \"current_identity_value\" FROM \"SYS\".\"DUMMY\"";

enum Job {
    Query {
        sql: String,
        parameters: Vec<Value>,
        autocommit: bool,
        reply: oneshot::Sender<Result<QueryResult>>,
    },
    Release {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Serializes every statement of one connection through a single worker.
pub struct SerialQueue {
    sender: mpsc::UnboundedSender<Job>,
    autocommit: AtomicBool,
}

impl SerialQueue {
    /// Spawns the worker that owns `inner`.
    #[must_use]
    pub fn spawn(inner: Arc<dyn Connection>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(drain(inner, receiver));
        Self {
            sender,
            autocommit: AtomicBool::new(true),
        }
    }

    fn closed() -> SyncError {
        SyncError::Driver("statement queue is closed".to_string())
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
}

async fn run(
    conn: &dyn Connection,
    sql: &str,
    parameters: &[Value],
    autocommit: bool,
) -> Result<QueryResult> {
    conn.set_autocommit(autocommit).await?;
    let mut result = conn.execute(sql, parameters).await?;
    if is_insert(sql) {
        let identity = conn.execute(IDENTITY_SQL, &[]).await?;
        result.last_insert_id = identity
            .records
            .first()
            .and_then(|row| row.int("current_identity_value"));
    }
    Ok(result)
}

async fn drain(conn: Arc<dyn Connection>, mut receiver: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = receiver.recv().await {
        match job {
            Job::Query {
                sql,
                parameters,
                autocommit,
                reply,
            } => {
                let result = run(conn.as_ref(), &sql, &parameters, autocommit).await;
                if reply.send(result).is_err() {
                    warn!(sql = %sql, "Caller went away before the statement finished");
                }
            }
            Job::Release { reply } => {
                if let Err(Err(err)) = reply.send(conn.release().await) {
                    debug!(error = %err, "Ignoring failed release, caller went away");
                }
                break;
            }
        }
    }
    debug!("Statement queue drained");
}

#[async_trait]
impl Connection for SerialQueue {
    async fn execute(&self, sql: &str, parameters: &[Value]) -> Result<QueryResult> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Job::Query {
                sql: sql.to_string(),
                parameters: parameters.to_vec(),
                autocommit: self.autocommit.load(Ordering::SeqCst),
                reply,
            })
            .map_err(|_| Self::closed())?;
        response.await.map_err(|_| Self::closed())?
    }

    async fn set_autocommit(&self, enabled: bool) -> Result<()> {
        self.autocommit.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Job::Release { reply })
            .map_err(|_| Self::closed())?;
        response.await.map_err(|_| Self::closed())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Connection for Journal {
        async fn execute(&self, sql: &str, _: &[Value]) -> Result<QueryResult> {
            // Earlier statements sleep longer, so any reordering would show.
            let delay = 30_u64.saturating_sub(self.entries.lock().unwrap().len() as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.entries.lock().unwrap().push(sql.to_string());
            if sql == IDENTITY_SQL {
                let row = serde_json::json!({"current_identity_value": 42});
                return Ok(QueryResult::rows(vec![row.as_object().cloned().unwrap()]));
            }
            Ok(QueryResult::default())
        }

        async fn set_autocommit(&self, enabled: bool) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .push(format!("autocommit={enabled}"));
            Ok(())
        }
    }

    fn statements(journal: &Journal) -> Vec<String> {
        journal
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.starts_with("autocommit"))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_statements_run_in_submission_order() {
        let journal = Arc::new(Journal::default());
        let queue = SerialQueue::spawn(journal.clone());

        let calls = (0..5).map(|i| {
            let sql = format!("UPDATE t SET v = {i}");
            let queue = &queue;
            async move { queue.execute(&sql, &[]).await }
        });
        for result in futures::future::join_all(calls).await {
            result.unwrap();
        }

        let expected: Vec<String> = (0..5).map(|i| format!("UPDATE t SET v = {i}")).collect();
        assert_eq!(statements(&journal), expected);
    }

    #[tokio::test]
    async fn test_insert_fetches_identity_before_next_statement() {
        let journal = Arc::new(Journal::default());
        let queue = SerialQueue::spawn(journal.clone());

        let (insert, select) = tokio::join!(
            queue.execute("INSERT INTO t VALUES (1)", &[]),
            queue.execute("SELECT 1 FROM DUMMY", &[]),
        );
        assert_eq!(insert.unwrap().last_insert_id, Some(42));
        select.unwrap();
        assert_eq!(
            statements(&journal),
            vec!["INSERT INTO t VALUES (1)", IDENTITY_SQL, "SELECT 1 FROM DUMMY"]
        );
    }

    #[tokio::test]
    async fn test_autocommit_follows_transaction_state() {
        let journal = Arc::new(Journal::default());
        let queue = SerialQueue::spawn(journal.clone());

        queue.execute("A", &[]).await.unwrap();
        queue.set_autocommit(false).await.unwrap();
        queue.execute("B", &[]).await.unwrap();
        queue.release().await.unwrap();

        let entries = journal.entries.lock().unwrap().clone();
        assert_eq!(entries, vec!["autocommit=true", "A", "autocommit=false", "B"]);
        assert!(queue.execute("C", &[]).await.is_err());
    }

    #[derive(Default)]
    struct StuckRelease {
        released: AtomicBool,
    }

    #[async_trait]
    impl Connection for StuckRelease {
        async fn execute(&self, _: &str, _: &[Value]) -> Result<QueryResult> {
            Ok(QueryResult::default())
        }

        async fn release(&self) -> Result<()> {
            self.released.store(true, Ordering::SeqCst);
            Err(SyncError::Driver("socket already closed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_release_reaches_waiting_caller() {
        let inner = Arc::new(StuckRelease::default());
        let queue = SerialQueue::spawn(inner.clone());

        assert!(matches!(queue.release().await, Err(SyncError::Driver(_))));
        assert!(inner.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_release_without_caller_still_stops_worker() {
        let inner = Arc::new(StuckRelease::default());
        let queue = SerialQueue::spawn(inner.clone());

        let (reply, response) = oneshot::channel();
        drop(response);
        queue.sender.send(Job::Release { reply }).unwrap();

        assert!(queue.execute("SELECT 1", &[]).await.is_err());
        assert!(inner.released.load(Ordering::SeqCst));
    }
}
