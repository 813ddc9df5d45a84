//! Domain errors for the audit engine.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the audit queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Audit store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),

    #[error("Transaction conflict on {operation}: gave up after {attempts} attempts")]
    TransactionConflict {
        operation: &'static str,
        attempts: u32,
    },

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid worker id: {0:?}")]
    InvalidWorkerId(String),

    #[error("Corrupt queue row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

pub type QueueResult<T> = Result<T, QueueError>;

impl QueueError {
    /// Whether the backing store could not be reached at all.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::StoreUnavailable(err),
            sqlx::Error::Database(db) if db.message().contains("database is locked") => {
                Self::StoreUnavailable(err)
            }
            _ => Self::Database(err),
        }
    }
}

/// Errors from the farmer RPC capability.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Farmer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Farmer rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors from contact lookup tiers.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Contact store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Invalid contact record: {0}")]
    InvalidRecord(String),
}

/// Reasons a storage proof cannot be evaluated.
#[derive(Debug, Error, PartialEq)]
pub enum ProofError {
    #[error("Malformed proof: {0}")]
    Malformed(String),

    #[error("Proof nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("Invalid hex in proof: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}
