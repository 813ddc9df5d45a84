use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::errors::QueueResult;
use crate::domain::models::{Audit, QueueStats, WorkerId};

/// Port for the durable audit queue state machine.
///
/// Every audit is in exactly one of Backlog, Ready, Pending(worker), Passed
/// or Failed. All cross-state transitions are atomic with respect to
/// transitions issued concurrently by other workers or the coordinator.
#[async_trait]
pub trait AuditQueue: Send + Sync {
    /// Insert audits into Backlog, scored by `scheduled_at`.
    ///
    /// Not deduplicated: enqueueing the same audit twice stores it twice.
    async fn enqueue(&self, audits: &[Audit]) -> QueueResult<u64>;

    /// Move every Backlog audit scheduled within `[start, stop]` to the tail
    /// of Ready, in schedule order, as one unit.
    ///
    /// Returns the number moved and whether a promotion was committed
    /// (`false` when nothing was due).
    async fn promote(&self, start: DateTime<Utc>, stop: DateTime<Utc>)
        -> QueueResult<(u64, bool)>;

    /// Pop the head of Ready into `worker`'s Pending partition.
    async fn claim(&self, worker: &WorkerId) -> QueueResult<Option<Audit>>;

    /// Like [`claim`](Self::claim), but waits until an audit is available
    /// or `timeout` elapses. `Duration::ZERO` waits indefinitely.
    async fn claim_blocking(
        &self,
        worker: &WorkerId,
        timeout: Duration,
    ) -> QueueResult<Option<Audit>>;

    /// Audits currently in `worker`'s Pending partition, oldest claim first.
    async fn list_pending(&self, worker: &WorkerId) -> QueueResult<Vec<Audit>>;

    /// Move one matching occurrence of `audit` from `worker`'s Pending
    /// partition into Passed or Failed and publish the outcome.
    ///
    /// Returns `false` without side effects when no matching Pending
    /// occurrence exists, e.g. when the audit is already terminal.
    async fn commit(&self, worker: &WorkerId, audit: &Audit, passed: bool) -> QueueResult<bool>;

    /// Number of audits per state.
    async fn stats(&self) -> QueueResult<QueueStats>;

    /// Most recent terminal outcomes, newest first.
    async fn list_outcomes(&self, passed: bool, limit: usize) -> QueueResult<Vec<Audit>>;
}
