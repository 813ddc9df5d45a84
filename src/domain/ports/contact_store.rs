use async_trait::async_trait;

use crate::domain::errors::ContactError;
use crate::domain::models::{Contact, KnownContact};

/// Persistent store of farmer contacts (second lookup tier).
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Look up a contact by node ID.
    async fn get(&self, id: &str) -> Result<Option<Contact>, ContactError>;

    /// Insert or refresh a contact, stamping it as seen now.
    async fn upsert(&self, contact: &Contact) -> Result<(), ContactError>;

    /// Most recently seen contacts, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<KnownContact>, ContactError>;
}
