//! Audit domain model.
//!
//! An audit is one scheduled challenge/response integrity test for a shard
//! held by a farmer. Audits move through the queue states
//! `Backlog -> Ready -> Pending(worker) -> Passed | Failed`.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::QueueError;

/// Challenge material for a single audit.
///
/// Field order is part of the store identity: the queue matches audits by
/// exact equality of [`AuditPayload::canonical_json`], so fields must not be
/// reordered once audits have been enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditPayload {
    /// Node ID of the farmer holding the shard.
    pub subject_id: String,
    /// Hex-encoded Merkle root committed at contract time.
    pub merkle_root: String,
    /// Depth of the committed Merkle tree.
    pub merkle_depth: u32,
    /// Hex-encoded challenge the farmer must answer.
    pub challenge: String,
    /// Hash identifying the shard being audited.
    pub data_hash: String,
}

impl AuditPayload {
    /// Stable serialization used as the queue identity key.
    pub fn canonical_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(QueueError::from)
    }

    /// Parse a payload previously produced by [`Self::canonical_json`].
    pub fn from_canonical_json(s: &str) -> Result<Self, QueueError> {
        serde_json::from_str(s).map_err(QueueError::from)
    }
}

/// A scheduled audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    /// When the audit becomes due.
    pub scheduled_at: DateTime<Utc>,
    /// What to challenge the farmer with.
    pub payload: AuditPayload,
}

impl Audit {
    /// `scheduled_at` is truncated to whole milliseconds, the resolution the
    /// queue stores.
    pub fn new(scheduled_at: DateTime<Utc>, payload: AuditPayload) -> Self {
        Self {
            scheduled_at: scheduled_at.trunc_subsecs(3),
            payload,
        }
    }

    /// Farmer node ID under audit.
    pub fn subject_id(&self) -> &str {
        &self.payload.subject_id
    }
}

/// State of an audit inside the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Scheduled, not yet due
    Backlog,
    /// Due and waiting for a worker
    Ready,
    /// Claimed by a worker, verification in flight
    Pending,
    /// Farmer proved possession
    Passed,
    /// Farmer could not prove possession
    Failed,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Ready => "ready",
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "backlog" => Some(Self::Backlog),
            "ready" => Some(Self::Ready),
            "pending" => Some(Self::Pending),
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Passed and Failed are append-only outcomes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }

    /// Terminal state for a verification outcome.
    pub fn for_outcome(passed: bool) -> Self {
        if passed {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of a worker and the key of its Pending partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Create a worker id. Must be non-empty and free of whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, QueueError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(QueueError::InvalidWorkerId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical notification channel for committed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeChannel {
    #[serde(rename = "audit.pass")]
    Pass,
    #[serde(rename = "audit.fail")]
    Fail,
}

impl OutcomeChannel {
    pub fn for_outcome(passed: bool) -> Self {
        if passed {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "audit.pass",
            Self::Fail => "audit.fail",
        }
    }
}

impl fmt::Display for OutcomeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed verification result, as published to outcome subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditOutcome {
    pub channel: OutcomeChannel,
    pub worker_id: WorkerId,
    pub audit: Audit,
    pub committed_at: DateTime<Utc>,
}

impl AuditOutcome {
    pub fn passed(&self) -> bool {
        self.channel == OutcomeChannel::Pass
    }
}

/// Number of audits in each queue state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub backlog: u64,
    pub ready: u64,
    pub pending: u64,
    pub passed: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Total audits known to the queue, across every state.
    pub fn total(&self) -> u64 {
        self.backlog + self.ready + self.pending + self.passed + self.failed
    }

    pub(crate) fn set(&mut self, state: QueueState, count: u64) {
        match state {
            QueueState::Backlog => self.backlog = count,
            QueueState::Ready => self.ready = count,
            QueueState::Pending => self.pending = count,
            QueueState::Passed => self.passed = count,
            QueueState::Failed => self.failed = count,
        }
    }
}
