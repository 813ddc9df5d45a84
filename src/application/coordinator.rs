//! Coordinator: worker supervision and time-based promotion.
//!
//! The coordinator holds no per-audit state. It keeps a fixed set of workers
//! alive, respawning each under the same identity when it exits, and
//! periodically promotes due audits from Backlog to Ready.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::worker_launcher::WorkerLauncher;
use crate::domain::errors::QueueResult;
use crate::domain::models::{CoordinatorConfig, WorkerConfig};
use crate::domain::ports::AuditQueue;

/// Counters describing what the coordinator has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Worker launches, including the initial ones
    pub launches: u64,
    /// Worker exits that led to a respawn
    pub restarts: u64,
    /// Promotion passes that committed
    pub promotions: u64,
    /// Audits moved from Backlog to Ready
    pub promoted: u64,
}

#[derive(Default)]
struct Counters {
    launches: AtomicU64,
    restarts: AtomicU64,
    promotions: AtomicU64,
    promoted: AtomicU64,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    queue: Arc<dyn AuditQueue>,
    launcher: Arc<dyn WorkerLauncher>,
    counters: Arc<Counters>,
    shutdown_tx: watch::Sender<bool>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        queue: Arc<dyn AuditQueue>,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            queue,
            launcher,
            counters: Arc::new(Counters::default()),
            shutdown_tx,
        }
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            launches: self.counters.launches.load(Ordering::Relaxed),
            restarts: self.counters.restarts.load(Ordering::Relaxed),
            promotions: self.counters.promotions.load(Ordering::Relaxed),
            promoted: self.counters.promoted.load(Ordering::Relaxed),
        }
    }

    /// Stop supervising: terminate workers and end the promotion ticker.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Promote every Backlog audit due by `now + padding`.
    pub async fn promote_due(&self, now: DateTime<Utc>) -> QueueResult<(u64, bool)> {
        promote_due(
            self.queue.as_ref(),
            &self.counters,
            now,
            padding(self.config.promotion.padding_secs),
        )
        .await
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<()> {
        info!(
            workers = self.config.workers.len(),
            promotion = self.config.promotion.enabled,
            "Coordinator starting"
        );

        let mut tasks = JoinSet::new();
        for worker in &self.config.workers {
            tasks.spawn(supervise(
                worker.clone(),
                Arc::clone(&self.launcher),
                Arc::clone(&self.counters),
                self.shutdown_tx.subscribe(),
                Duration::from_millis(self.config.restart_delay_ms),
                Duration::from_secs(self.config.shutdown_timeout_secs),
            ));
        }

        if self.config.promotion.enabled {
            tasks.spawn(promotion_loop(
                Arc::clone(&self.queue),
                Arc::clone(&self.counters),
                self.shutdown_tx.subscribe(),
                Duration::from_secs(self.config.promotion.interval_secs.max(1)),
                padding(self.config.promotion.padding_secs),
            ));
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Coordinator task panicked");
            }
        }

        info!(stats = ?self.stats(), "Coordinator stopped");
        Ok(())
    }
}

fn padding(secs: u64) -> ChronoDuration {
    // chrono panics above i64::MAX milliseconds
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    ChronoDuration::seconds(secs)
}

async fn promote_due(
    queue: &dyn AuditQueue,
    counters: &Counters,
    now: DateTime<Utc>,
    padding: ChronoDuration,
) -> QueueResult<(u64, bool)> {
    let stop = now.checked_add_signed(padding).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let (moved, committed) = queue.promote(DateTime::<Utc>::MIN_UTC, stop).await?;
    if committed {
        counters.promotions.fetch_add(1, Ordering::Relaxed);
        counters.promoted.fetch_add(moved, Ordering::Relaxed);
    }
    Ok((moved, committed))
}

async fn stopped(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

async fn supervise(
    worker: WorkerConfig,
    launcher: Arc<dyn WorkerLauncher>,
    counters: Arc<Counters>,
    mut shutdown_rx: watch::Receiver<bool>,
    restart_delay: Duration,
    shutdown_timeout: Duration,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        counters.launches.fetch_add(1, Ordering::Relaxed);
        match launcher.launch(&worker).await {
            Ok(mut handle) => {
                tokio::select! {
                    exit = handle.wait() => {
                        counters.restarts.fetch_add(1, Ordering::Relaxed);
                        warn!(worker_id = %worker.id, %exit, "Worker exited; respawning");
                    }
                    () = stopped(&mut shutdown_rx) => {
                        let exit = handle.terminate(shutdown_timeout).await;
                        info!(worker_id = %worker.id, %exit, "Worker stopped");
                        break;
                    }
                }
            }
            Err(e) => {
                error!(worker_id = %worker.id, error = %e, "Failed to launch worker");
            }
        }

        tokio::select! {
            () = stopped(&mut shutdown_rx) => break,
            () = tokio::time::sleep(restart_delay) => {}
        }
    }
}

async fn promotion_loop(
    queue: Arc<dyn AuditQueue>,
    counters: Arc<Counters>,
    mut shutdown_rx: watch::Receiver<bool>,
    every: Duration,
    padding: ChronoDuration,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = every.as_secs(), "Promotion ticker started");

    loop {
        tokio::select! {
            () = stopped(&mut shutdown_rx) => break,
            _ = ticker.tick() => {
                match promote_due(queue.as_ref(), &counters, Utc::now(), padding).await {
                    Ok((moved, true)) => info!(moved, "Promoted due audits"),
                    Ok((_, false)) => debug!("No audits due"),
                    Err(e) => error!(error = %e, "Promotion failed"),
                }
            }
        }
    }

    info!("Promotion ticker stopped");
}
