//! Infrastructure adapters for external systems.

pub mod cache;
pub mod discovery;
pub mod farmer;
pub mod sqlite;
