//! Three-tier farmer contact resolution.
//!
//! Lookups try the in-memory routing cache, then the persistent contact
//! store, then live network discovery. The first hit wins. Hits from a lower
//! tier are written back to the routing cache, and discovered contacts are
//! also persisted so the next process start can seed from them.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::cache::RoutingCache;
use crate::domain::errors::ContactError;
use crate::domain::models::Contact;
use crate::domain::ports::{ContactStore, NetworkDiscovery};

/// Tier that answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactTier {
    RoutingCache,
    ContactStore,
    Discovery,
}

impl fmt::Display for ContactTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RoutingCache => "routing_cache",
            Self::ContactStore => "contact_store",
            Self::Discovery => "discovery",
        })
    }
}

pub struct ContactResolver {
    cache: RoutingCache,
    store: Arc<dyn ContactStore>,
    discovery: Arc<dyn NetworkDiscovery>,
}

impl ContactResolver {
    pub fn new(
        cache: RoutingCache,
        store: Arc<dyn ContactStore>,
        discovery: Arc<dyn NetworkDiscovery>,
    ) -> Self {
        Self {
            cache,
            store,
            discovery,
        }
    }

    /// Load up to `limit` recently seen contacts into the routing cache.
    ///
    /// Returns the loaded contacts so the farmer transport can be seeded
    /// with the same set.
    pub async fn seed_from_store(&self, limit: usize) -> Result<Vec<Contact>, ContactError> {
        let contacts: Vec<Contact> = self
            .store
            .recent(limit)
            .await?
            .into_iter()
            .map(|known| known.contact)
            .collect();
        self.cache.seed(contacts.iter().cloned()).await;
        debug!(count = contacts.len(), "Seeded routing cache");
        Ok(contacts)
    }

    /// Resolve a farmer contact. Tier failures count as misses.
    pub async fn resolve(&self, id: &str) -> Option<Contact> {
        self.resolve_with_tier(id).await.map(|(contact, _)| contact)
    }

    pub async fn resolve_with_tier(&self, id: &str) -> Option<(Contact, ContactTier)> {
        if let Some(contact) = self.cache.get(id).await {
            return Some((contact, ContactTier::RoutingCache));
        }

        match self.store.get(id).await {
            Ok(Some(contact)) => {
                self.cache.insert(contact.clone()).await;
                return Some((contact, ContactTier::ContactStore));
            }
            Ok(None) => {}
            Err(e) => warn!(node_id = id, error = %e, "Contact store lookup failed"),
        }

        match self.discovery.find_contact(id).await {
            Ok(Some(contact)) => {
                self.cache.insert(contact.clone()).await;
                if let Err(e) = self.store.upsert(&contact).await {
                    warn!(node_id = id, error = %e, "Failed to persist discovered contact");
                }
                Some((contact, ContactTier::Discovery))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(node_id = id, error = %e, "Network discovery failed");
                None
            }
        }
    }

    /// Drop a cached route so the next lookup goes back to the store.
    pub async fn forget(&self, id: &str) {
        self.cache.invalidate(id).await;
        debug!(node_id = id, "Dropped cached route");
    }

    pub fn cache(&self) -> &RoutingCache {
        &self.cache
    }
}
