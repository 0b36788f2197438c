//! Transaction lifecycle hooks.

use async_trait::async_trait;

use crate::error::Result;

/// A transaction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionEvent {
    /// Before `START TRANSACTION`.
    BeforeStart,
    /// After the transaction started.
    AfterStart,
    /// Before `COMMIT`.
    BeforeCommit,
    /// After the commit.
    AfterCommit,
    /// Before `ROLLBACK`.
    BeforeRollback,
    /// After the rollback.
    AfterRollback,
}

/// Observes transaction boundaries of one query runner.
///
/// The runner awaits every subscriber before it considers the boundary
/// crossed, so side effects are ordered with the statements around them.
/// A failing subscriber fails the boundary call.
#[async_trait]
pub trait TransactionSubscriber: Send + Sync {
    /// Called for every boundary.
    async fn on_transaction(&self, event: TransactionEvent) -> Result<()>;
}
