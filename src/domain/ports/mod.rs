//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that adapters implement:
//! - AuditQueue: durable audit state machine
//! - FarmerClient: storage proof RPC
//! - ContactStore / NetworkDiscovery: contact resolution tiers
//! - OutcomePublisher: pass/fail notifications

pub mod audit_queue;
pub mod contact_store;
pub mod farmer_client;
pub mod network_discovery;
pub mod outcome_publisher;

pub use audit_queue::AuditQueue;
pub use contact_store::ContactStore;
pub use farmer_client::FarmerClient;
pub use network_discovery::{NetworkDiscovery, NullDiscovery};
pub use outcome_publisher::OutcomePublisher;
