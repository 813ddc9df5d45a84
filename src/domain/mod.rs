//! Domain layer for the audit engine
//!
//! Audit, contact and proof models, error types, and the port traits that
//! adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ContactError, ProofError, QueueError, QueueResult, RpcError};
