//! bridge-audit: audit scheduling and storage proof verification
//!
//! Audits are periodic challenge/response integrity tests of shards held by
//! untrusted farmers. They flow through a durable SQLite-backed queue
//! (`Backlog -> Ready -> Pending(worker) -> Passed | Failed`), are claimed by
//! bounded-concurrency workers, verified against the committed Merkle root,
//! and published as pass/fail outcomes.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): audit models, errors and port traits
//! - **Adapters** (`adapters`): SQLite queue and contact store, HTTP farmer
//!   client and discovery, routing cache
//! - **Service Layer** (`services`): auditor, Merkle verification, contact
//!   resolution, job ingestion, outcome bus
//! - **Application Layer** (`application`): worker and coordinator runtimes
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use adapters::sqlite::SqliteAuditQueue;
pub use application::{Coordinator, Worker};
pub use domain::errors::{QueueError, QueueResult};
pub use domain::models::{Audit, AuditPayload, Config, QueueStats, StorageItem, WorkerId};
pub use domain::ports::{AuditQueue, FarmerClient, OutcomePublisher};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{create_jobs_from_storage_item, verify_storage_proof, Auditor};
