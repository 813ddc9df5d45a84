//! Storage item model used for audit job ingestion.
//!
//! The contract layer hands over a storage item carrying the pre-generated
//! challenge set for one shard contract. The engine never generates
//! challenges itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Active interval of a shard contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub store_begin: DateTime<Utc>,
    pub store_end: DateTime<Utc>,
}

/// Pre-generated challenges plus the tree they were committed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSet {
    /// Hex-encoded challenges, one audit each
    pub challenges: Vec<String>,
    /// Hex-encoded Merkle root
    pub root: String,
    /// Merkle tree depth
    pub depth: u32,
}

/// Storage item for one shard held by one farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub data_hash: String,
    pub contract: ContractTerms,
    pub challenges: ChallengeSet,
}
