//! In-memory caching layer for the contact resolution hot path.
//!
//! Uses `moka` for TTL-based concurrent caching.

pub mod routing_cache;

pub use routing_cache::RoutingCache;
