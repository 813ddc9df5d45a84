use async_trait::async_trait;

use crate::domain::errors::ContactError;
use crate::domain::models::Contact;

/// Live network lookup (third and last contact tier).
#[async_trait]
pub trait NetworkDiscovery: Send + Sync {
    async fn find_contact(&self, id: &str) -> Result<Option<Contact>, ContactError>;
}

/// Discovery that never finds anything. Used when no seeds are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiscovery;

#[async_trait]
impl NetworkDiscovery for NullDiscovery {
    async fn find_contact(&self, _id: &str) -> Result<Option<Contact>, ContactError> {
        Ok(None)
    }
}
