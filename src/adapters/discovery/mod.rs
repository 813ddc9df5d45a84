//! Network discovery tier for contact resolution.

pub mod http_discovery;

pub use http_discovery::HttpDiscovery;
