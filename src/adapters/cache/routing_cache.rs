//! In-memory routing table: the first contact resolution tier.
//!
//! Backed by a `moka` TTL cache so stale farmer addresses age out and the
//! table stays bounded under millions of distinct subjects.

use moka::future::Cache;
use std::time::Duration;

use crate::domain::models::{Contact, WorkerSettings};

/// Default TTL for cached contacts.
const ROUTING_CACHE_TTL_SECS: u64 = 3_600;

/// Default number of cached contacts.
const ROUTING_CACHE_MAX_CAPACITY: u64 = 10_000;

#[derive(Clone)]
pub struct RoutingCache {
    contacts: Cache<String, Contact>,
}

impl Default for RoutingCache {
    fn default() -> Self {
        Self::new(
            ROUTING_CACHE_MAX_CAPACITY,
            Duration::from_secs(ROUTING_CACHE_TTL_SECS),
        )
    }
}

impl RoutingCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        let contacts = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        Self { contacts }
    }

    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self::new(
            settings.routing_cache_capacity,
            Duration::from_secs(settings.routing_cache_ttl_secs),
        )
    }

    pub async fn get(&self, id: &str) -> Option<Contact> {
        self.contacts.get(id).await
    }

    pub async fn insert(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact).await;
    }

    /// Bulk-load contacts, e.g. the most recently seen ones at startup.
    pub async fn seed(&self, contacts: impl IntoIterator<Item = Contact>) {
        for contact in contacts {
            self.insert(contact).await;
        }
    }

    pub async fn invalidate(&self, id: &str) {
        self.contacts.invalidate(id).await;
    }

    /// Approximate number of cached contacts.
    pub async fn len(&self) -> u64 {
        self.contacts.run_pending_tasks().await;
        self.contacts.entry_count()
    }
}
