pub mod audit;
pub mod config;
pub mod contact;
pub mod proof;
pub mod storage_item;

pub use audit::{
    Audit, AuditOutcome, AuditPayload, OutcomeChannel, QueueState, QueueStats, WorkerId,
};
pub use config::{
    Config, CoordinatorConfig, DatabaseConfig, LaunchMode, LoggingConfig, NetworkConfig,
    PromotionConfig, QueueConfig, WorkerConfig, WorkerSettings,
};
pub use contact::{Contact, KnownContact};
pub use proof::{ProofElement, StorageProof};
pub use storage_item::{ChallengeSet, ContractTerms, StorageItem};
