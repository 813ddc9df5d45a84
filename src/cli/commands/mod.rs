//! CLI command implementations.

pub mod coordinator;
pub mod enqueue;
pub mod outcomes;
pub mod promote;
pub mod status;
pub mod worker;
