//! Farmer contact descriptor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Network address of a farmer node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    /// Node ID
    pub id: String,
    /// Hostname or IP address
    pub address: String,
    /// RPC port
    pub port: u16,
}

impl Contact {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
        }
    }

    /// Base URL for HTTP transports.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// A contact as recorded by the persistent contact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownContact {
    pub contact: Contact,
    pub last_seen: DateTime<Utc>,
}
