//! SQLite implementation of the AuditQueue.
//!
//! Every audit occurrence is one row of `audit_queue`; its `state` column is
//! the queue it currently belongs to. Transitions are conditional updates
//! guarded by the row `version`, so concurrent coordinators and workers never
//! move the same row twice:
//!
//! - `claim` is a single `UPDATE .. RETURNING` that pops the Ready head.
//! - `promote` reads its candidates, then updates them in one transaction,
//!   rolling back and retrying if any candidate changed in between.
//! - `commit` picks the earliest matching Pending occurrence and moves it
//!   with one version-checked update.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::{from_millis, to_millis};
use crate::domain::errors::{QueueError, QueueResult};
use crate::domain::models::{
    Audit, AuditOutcome, AuditPayload, OutcomeChannel, QueueConfig, QueueState, QueueStats,
    WorkerId,
};
use crate::domain::ports::{AuditQueue, OutcomePublisher};

pub struct SqliteAuditQueue {
    pool: SqlitePool,
    config: QueueConfig,
    publisher: Option<Arc<dyn OutcomePublisher>>,
    ready: Arc<Notify>,
    conflicts: AtomicU64,
}

impl SqliteAuditQueue {
    pub fn new(pool: SqlitePool, config: QueueConfig) -> Self {
        Self {
            pool,
            config,
            publisher: None,
            ready: Arc::new(Notify::new()),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Publish committed outcomes through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn OutcomePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Optimistic-lock conflicts observed by this instance since creation.
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    fn backoff_policy(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.conflict_initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.conflict_max_backoff_ms))
            .with_max_elapsed_time(Some(Duration::from_millis(
                self.config.conflict_max_elapsed_ms,
            )))
            .build()
    }

    /// Run `attempt` until it commits. `Ok(None)` from an attempt means its
    /// optimistic check failed and nothing was written.
    async fn retry_on_conflict<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> QueueResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = QueueResult<Option<T>>>,
    {
        let mut policy = self.backoff_policy();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if let Some(value) = attempt().await? {
                return Ok(value);
            }
            self.conflicts.fetch_add(1, Ordering::Relaxed);

            match policy.next_backoff() {
                Some(delay) => {
                    debug!(
                        operation,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Queue conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(operation, attempts, "Queue conflict retries exhausted");
                    return Err(QueueError::TransactionConflict {
                        operation,
                        attempts,
                    });
                }
            }
        }
    }

    async fn try_promote(&self, start: i64, stop: i64) -> QueueResult<Option<(u64, bool)>> {
        let candidates: Vec<(i64, i64)> = sqlx::query_as(
            r#"SELECT id, version FROM audit_queue
               WHERE state = 'backlog' AND scheduled_at BETWEEN ? AND ?
               ORDER BY scheduled_at, id"#,
        )
        .bind(start)
        .bind(stop)
        .fetch_all(&self.pool)
        .await?;

        if candidates.is_empty() {
            return Ok(Some((0, false)));
        }

        let mut tx = self.pool.begin().await?;
        for (id, version) in &candidates {
            let result = sqlx::query(
                r#"UPDATE audit_queue
                   SET state = 'ready',
                       ready_seq = (SELECT COALESCE(MAX(ready_seq), 0) + 1 FROM audit_queue),
                       version = version + 1
                   WHERE id = ? AND state = 'backlog' AND version = ?"#,
            )
            .bind(id)
            .bind(version)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(None);
            }
        }
        tx.commit().await?;

        Ok(Some((candidates.len() as u64, true)))
    }

    async fn try_commit(
        &self,
        worker: &WorkerId,
        payload: &str,
        passed: bool,
    ) -> QueueResult<Option<Option<Audit>>> {
        let row: Option<AuditRow> = sqlx::query_as(
            r#"SELECT id, payload, scheduled_at, version FROM audit_queue
               WHERE state = 'pending' AND worker_id = ? AND payload = ?
               ORDER BY pending_seq
               LIMIT 1"#,
        )
        .bind(worker.as_str())
        .bind(payload)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(Some(None));
        };

        let result = sqlx::query(
            r#"UPDATE audit_queue
               SET state = ?, completed_at = ?, version = version + 1
               WHERE id = ? AND state = 'pending' AND worker_id = ? AND version = ?"#,
        )
        .bind(QueueState::for_outcome(passed).as_str())
        .bind(to_millis(Utc::now()))
        .bind(row.id)
        .bind(worker.as_str())
        .bind(row.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Some(row.try_into()?)))
    }

    fn publish(&self, worker: &WorkerId, audit: Audit, passed: bool) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(AuditOutcome {
                channel: OutcomeChannel::for_outcome(passed),
                worker_id: worker.clone(),
                audit,
                committed_at: Utc::now(),
            });
        }
    }
}

#[async_trait]
impl AuditQueue for SqliteAuditQueue {
    #[instrument(skip(self, audits), fields(count = audits.len()))]
    async fn enqueue(&self, audits: &[Audit]) -> QueueResult<u64> {
        if audits.is_empty() {
            return Ok(0);
        }

        let enqueued_at = to_millis(Utc::now());
        let mut tx = self.pool.begin().await?;
        for audit in audits {
            sqlx::query(
                r#"INSERT INTO audit_queue (payload, scheduled_at, state, enqueued_at)
                   VALUES (?, ?, 'backlog', ?)"#,
            )
            .bind(audit.payload.canonical_json()?)
            .bind(to_millis(audit.scheduled_at))
            .bind(enqueued_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.ready.notify_waiters();
        debug!("Enqueued audits into backlog");
        Ok(audits.len() as u64)
    }

    #[instrument(skip(self))]
    async fn promote(
        &self,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> QueueResult<(u64, bool)> {
        let (start, stop) = (to_millis(start), to_millis(stop));
        let (moved, committed) = self
            .retry_on_conflict("promote", || self.try_promote(start, stop))
            .await?;

        if moved > 0 {
            self.ready.notify_waiters();
            debug!(moved, "Promoted due audits to ready");
        }
        Ok((moved, committed))
    }

    async fn claim(&self, worker: &WorkerId) -> QueueResult<Option<Audit>> {
        let row: Option<AuditRow> = sqlx::query_as(
            r#"UPDATE audit_queue
               SET state = 'pending',
                   worker_id = ?,
                   claimed_at = ?,
                   pending_seq = (SELECT COALESCE(MAX(pending_seq), 0) + 1 FROM audit_queue),
                   version = version + 1
               WHERE id = (
                   SELECT id FROM audit_queue
                   WHERE state = 'ready'
                   ORDER BY ready_seq
                   LIMIT 1
               )
               RETURNING id, payload, scheduled_at, version"#,
        )
        .bind(worker.as_str())
        .bind(to_millis(Utc::now()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Audit::try_from).transpose()
    }

    async fn claim_blocking(
        &self,
        worker: &WorkerId,
        timeout: Duration,
    ) -> QueueResult<Option<Audit>> {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        let poll = Duration::from_millis(self.config.claim_poll_interval_ms.max(1));

        loop {
            // Register before checking so a promote between the check and
            // the wait still wakes us.
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(audit) = self.claim(worker).await? {
                return Ok(Some(audit));
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    poll.min(deadline - now)
                }
                None => poll,
            };
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    async fn list_pending(&self, worker: &WorkerId) -> QueueResult<Vec<Audit>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"SELECT id, payload, scheduled_at, version FROM audit_queue
               WHERE state = 'pending' AND worker_id = ?
               ORDER BY pending_seq"#,
        )
        .bind(worker.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Audit::try_from).collect()
    }

    #[instrument(skip(self, audit), fields(subject = %audit.subject_id()))]
    async fn commit(&self, worker: &WorkerId, audit: &Audit, passed: bool) -> QueueResult<bool> {
        let payload = audit.payload.canonical_json()?;
        let committed = self
            .retry_on_conflict("commit", || self.try_commit(worker, &payload, passed))
            .await?;

        match committed {
            Some(stored) => {
                self.publish(worker, stored, passed);
                Ok(true)
            }
            None => {
                debug!("No matching pending audit; commit is a no-op");
                Ok(false)
            }
        }
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM audit_queue GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = QueueStats::default();
        for (state, count) in rows {
            if let Some(state) = QueueState::from_str(&state) {
                stats.set(state, u64::try_from(count).unwrap_or(0));
            }
        }
        Ok(stats)
    }

    async fn list_outcomes(&self, passed: bool, limit: usize) -> QueueResult<Vec<Audit>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"SELECT id, payload, scheduled_at, version FROM audit_queue
               WHERE state = ?
               ORDER BY completed_at DESC, id DESC
               LIMIT ?"#,
        )
        .bind(QueueState::for_outcome(passed).as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Audit::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: i64,
    payload: String,
    scheduled_at: i64,
    version: i64,
}

impl TryFrom<AuditRow> for Audit {
    type Error = QueueError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let payload =
            AuditPayload::from_canonical_json(&row.payload).map_err(|e| QueueError::CorruptRow {
                id: row.id,
                reason: e.to_string(),
            })?;
        let scheduled_at = from_millis(row.scheduled_at).ok_or_else(|| QueueError::CorruptRow {
            id: row.id,
            reason: format!("scheduled_at out of range: {}", row.scheduled_at),
        })?;
        Ok(Audit::new(scheduled_at, payload))
    }
}
