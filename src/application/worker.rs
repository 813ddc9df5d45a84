//! Bounded-concurrency audit worker.
//!
//! A worker owns the Pending partition keyed by its identity. Startup is
//! strictly ordered:
//!
//! 1. connect the farmer transport, seeding the routing cache from the most
//!    recently seen contacts;
//! 2. re-drive every audit left in its Pending partition by a previous run;
//! 3. run `limit` slots, each looping claim-blocking then process.
//!
//! On shutdown the slots stop claiming and in-flight audits get a bounded
//! drain period. Anything still unfinished stays Pending and is recovered by
//! step 2 of the next start under the same identity.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::adapters::cache::RoutingCache;
use crate::adapters::discovery::HttpDiscovery;
use crate::adapters::farmer::HttpFarmerClient;
use crate::adapters::sqlite::{SqliteAuditQueue, SqliteContactStore};
use crate::domain::models::{Config, WorkerId, WorkerSettings};
use crate::domain::ports::{AuditQueue, FarmerClient, NetworkDiscovery, NullDiscovery};
use crate::services::{Auditor, ContactResolver, OutcomeBus};

pub struct Worker {
    id: WorkerId,
    limit: usize,
    queue: Arc<dyn AuditQueue>,
    farmer: Arc<dyn FarmerClient>,
    resolver: Arc<ContactResolver>,
    auditor: Arc<Auditor>,
    settings: WorkerSettings,
    processed: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        limit: usize,
        queue: Arc<dyn AuditQueue>,
        farmer: Arc<dyn FarmerClient>,
        resolver: Arc<ContactResolver>,
        settings: WorkerSettings,
    ) -> Self {
        let auditor = Arc::new(Auditor::new(
            id.clone(),
            Arc::clone(&queue),
            Arc::clone(&farmer),
            Arc::clone(&resolver),
            Duration::from_secs(settings.rpc_timeout_secs),
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            id,
            limit: limit.max(1),
            queue,
            farmer,
            resolver,
            auditor,
            settings,
            processed: Arc::new(AtomicU64::new(0)),
            shutdown_tx,
        }
    }

    /// Wire a worker against the shared store and the real network adapters.
    pub fn from_config(
        config: &Config,
        pool: SqlitePool,
        id: WorkerId,
        limit: usize,
    ) -> Result<Self> {
        let bus = Arc::new(OutcomeBus::default());
        let queue = Arc::new(
            SqliteAuditQueue::new(pool.clone(), config.queue.clone()).with_publisher(bus),
        );

        let discovery: Arc<dyn NetworkDiscovery> = if config.network.discovery_seeds.is_empty() {
            Arc::new(NullDiscovery)
        } else {
            Arc::new(
                HttpDiscovery::new(
                    config.network.discovery_seeds.clone(),
                    Duration::from_secs(config.network.http_timeout_secs),
                )
                .context("Failed to build discovery client")?,
            )
        };
        let resolver = Arc::new(ContactResolver::new(
            RoutingCache::from_settings(&config.worker),
            Arc::new(SqliteContactStore::new(pool)),
            discovery,
        ));

        let farmer = Arc::new(
            HttpFarmerClient::new(Duration::from_secs(config.worker.rpc_timeout_secs))
                .context("Failed to build farmer client")?,
        );

        Ok(Self::new(id, limit, queue, farmer, resolver, config.worker.clone()))
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Audits processed since this worker started.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Ask a running worker to stop claiming and drain.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(worker_id = %self.id, limit = self.limit, "Worker starting");

        self.connect().await?;

        tokio::select! {
            result = self.recover() => result?,
            () = stopped(&mut shutdown_rx) => {
                info!(
                    worker_id = %self.id,
                    "Shutdown during recovery; remaining audits stay pending"
                );
                return Ok(());
            }
        }

        self.dispatch().await;
        info!(worker_id = %self.id, processed = self.processed(), "Worker stopped");
        Ok(())
    }

    async fn connect(&self) -> Result<()> {
        let seeds = self
            .resolver
            .seed_from_store(self.settings.seed_contacts)
            .await
            .context("Failed to load recent contacts")?;
        self.farmer
            .connect(&seeds)
            .await
            .context("Failed to connect to farmer network")?;
        info!(worker_id = %self.id, seeds = seeds.len(), "Connected to farmer network");
        Ok(())
    }

    async fn recover(&self) -> Result<()> {
        let pending = self
            .queue
            .list_pending(&self.id)
            .await
            .context("Failed to list pending audits")?;
        if pending.is_empty() {
            return Ok(());
        }

        info!(worker_id = %self.id, count = pending.len(), "Recovering pending audits");
        stream::iter(pending)
            .for_each_concurrent(self.limit, |audit| {
                let auditor = &self.auditor;
                let processed = &self.processed;
                async move {
                    auditor.process(audit).await;
                    processed.fetch_add(1, Ordering::Relaxed);
                }
            })
            .await;
        Ok(())
    }

    async fn dispatch(&self) {
        let mut slots = JoinSet::new();
        for slot in 0..self.limit {
            slots.spawn(run_slot(
                slot,
                Arc::clone(&self.auditor),
                Arc::clone(&self.processed),
                self.shutdown_tx.subscribe(),
                Duration::from_millis(self.settings.claim_error_backoff_ms),
            ));
        }

        stopped(&mut self.shutdown_tx.subscribe()).await;

        let drain = Duration::from_secs(self.settings.drain_timeout_secs);
        let drained = tokio::time::timeout(drain, async {
            while let Some(result) = slots.join_next().await {
                if let Err(e) = result {
                    error!(worker_id = %self.id, error = %e, "Worker slot panicked");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                worker_id = %self.id,
                remaining = slots.len(),
                "Drain timeout; unfinished audits stay pending"
            );
            slots.shutdown().await;
        }
    }
}

/// Resolves once shutdown has been requested.
async fn stopped(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

async fn run_slot(
    slot: usize,
    auditor: Arc<Auditor>,
    processed: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
    error_backoff: Duration,
) {
    let worker_id = auditor.worker_id().clone();
    debug!(worker_id = %worker_id, slot, "Slot started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            () = stopped(&mut shutdown_rx) => break,
            claimed = auditor.get_blocking(Duration::ZERO) => match claimed {
                Ok(Some(audit)) => {
                    auditor.process(audit).await;
                    processed.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(worker_id = %worker_id, slot, error = %e, "Failed to claim audit");
                    tokio::select! {
                        () = stopped(&mut shutdown_rx) => break,
                        () = tokio::time::sleep(error_backoff) => {}
                    }
                }
            },
        }
    }

    debug!(worker_id = %worker_id, slot, "Slot stopped");
}
