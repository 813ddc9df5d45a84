use async_trait::async_trait;

use crate::domain::errors::RpcError;
use crate::domain::models::{Contact, StorageProof};

/// Port for the storage-network RPC capability used by auditors.
#[async_trait]
pub trait FarmerClient: Send + Sync {
    /// Prepare the transport. `seeds` are recently known contacts.
    async fn connect(&self, seeds: &[Contact]) -> Result<(), RpcError> {
        let _ = seeds;
        Ok(())
    }

    /// Ask `contact` to prove possession of `data_hash` for `challenge`.
    async fn get_storage_proof(
        &self,
        contact: &Contact,
        data_hash: &str,
        challenge: &str,
    ) -> Result<StorageProof, RpcError>;
}
