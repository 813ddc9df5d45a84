//! Broadcast bus for committed audit outcomes.
//!
//! Subscribers receive every outcome and can tell `audit.pass` from
//! `audit.fail` through [`AuditOutcome::channel`]. Per-channel counters let
//! operators see how many outcomes a process has published.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::info;

use crate::domain::models::{AuditOutcome, OutcomeChannel};
use crate::domain::ports::OutcomePublisher;

/// Configuration for the OutcomeBus.
#[derive(Debug, Clone)]
pub struct OutcomeBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for OutcomeBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

pub struct OutcomeBus {
    sender: broadcast::Sender<AuditOutcome>,
    passed: AtomicU64,
    failed: AtomicU64,
}

impl Default for OutcomeBus {
    fn default() -> Self {
        Self::new(OutcomeBusConfig::default())
    }
}

impl OutcomeBus {
    pub fn new(config: OutcomeBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            passed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Subscribe to both outcome channels.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditOutcome> {
        self.sender.subscribe()
    }

    /// Outcomes published on `channel` so far.
    pub fn published(&self, channel: OutcomeChannel) -> u64 {
        match channel {
            OutcomeChannel::Pass => self.passed.load(Ordering::Relaxed),
            OutcomeChannel::Fail => self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl OutcomePublisher for OutcomeBus {
    fn publish(&self, outcome: AuditOutcome) {
        let counter = match outcome.channel {
            OutcomeChannel::Pass => &self.passed,
            OutcomeChannel::Fail => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        info!(
            channel = %outcome.channel,
            worker_id = %outcome.worker_id,
            subject = %outcome.audit.subject_id(),
            data_hash = %outcome.audit.payload.data_hash,
            "Audit outcome committed"
        );

        // No subscribers is fine
        let _ = self.sender.send(outcome);
    }
}
