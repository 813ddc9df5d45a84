//! Audit verification logic bound to one worker identity.
//!
//! The auditor is stateless apart from its collaborators: it claims audits
//! into its worker's Pending partition, asks the farmer for a storage proof
//! under an explicit deadline, checks the proof against the committed Merkle
//! root and depth, and commits the verdict. Any failure to obtain or check a
//! proof is a failed audit, never an error.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::errors::{QueueResult, RpcError};
use crate::domain::models::{Audit, WorkerId};
use crate::domain::ports::{AuditQueue, FarmerClient};
use crate::services::contact_resolver::ContactResolver;
use crate::services::merkle::verify_storage_proof;

/// An audit paired with its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub audit: Audit,
    pub passed: bool,
}

pub struct Auditor {
    worker: WorkerId,
    queue: Arc<dyn AuditQueue>,
    farmer: Arc<dyn FarmerClient>,
    resolver: Arc<ContactResolver>,
    rpc_timeout: Duration,
}

impl Auditor {
    pub fn new(
        worker: WorkerId,
        queue: Arc<dyn AuditQueue>,
        farmer: Arc<dyn FarmerClient>,
        resolver: Arc<ContactResolver>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            worker,
            queue,
            farmer,
            resolver,
            rpc_timeout,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker
    }

    /// Claim the next Ready audit for this worker.
    pub async fn get(&self) -> QueueResult<Option<Audit>> {
        self.queue.claim(&self.worker).await
    }

    /// Claim the next Ready audit, waiting up to `timeout` (`ZERO` = forever).
    pub async fn get_blocking(&self, timeout: Duration) -> QueueResult<Option<Audit>> {
        self.queue.claim_blocking(&self.worker, timeout).await
    }

    /// Challenge the farmer and check its proof.
    #[instrument(
        skip(self, audit),
        fields(worker_id = %self.worker, subject = %audit.subject_id())
    )]
    pub async fn verify(&self, audit: Audit) -> VerificationResult {
        let Some(contact) = self.resolver.resolve(audit.subject_id()).await else {
            warn!("Farmer contact not found");
            return VerificationResult {
                audit,
                passed: false,
            };
        };

        let request = self.farmer.get_storage_proof(
            &contact,
            &audit.payload.data_hash,
            &audit.payload.challenge,
        );
        let proof = match tokio::time::timeout(self.rpc_timeout, request).await {
            Ok(Ok(proof)) => proof,
            Ok(Err(e)) => {
                warn!(error = %e, "Storage proof request failed");
                if matches!(e, RpcError::Transport(_)) {
                    self.resolver.forget(&contact.id).await;
                }
                return VerificationResult {
                    audit,
                    passed: false,
                };
            }
            Err(_) => {
                let e = RpcError::Timeout(self.rpc_timeout);
                warn!(error = %e, "Storage proof request failed");
                self.resolver.forget(&contact.id).await;
                return VerificationResult {
                    audit,
                    passed: false,
                };
            }
        };

        let passed = match verify_storage_proof(
            &proof,
            &audit.payload.merkle_root,
            audit.payload.merkle_depth,
        ) {
            Ok(matches) => {
                if !matches {
                    info!("Proof does not match committed root and depth");
                }
                matches
            }
            Err(e) => {
                warn!(error = %e, "Malformed storage proof");
                false
            }
        };

        debug!(passed, "Audit verified");
        VerificationResult { audit, passed }
    }

    /// Record a verdict for an audit in this worker's Pending partition.
    pub async fn commit(&self, audit: &Audit, passed: bool) -> QueueResult<bool> {
        self.queue.commit(&self.worker, audit, passed).await
    }

    /// Verify then commit. Errors are logged, never returned.
    pub async fn process(&self, audit: Audit) {
        let VerificationResult { audit, passed } = self.verify(audit).await;
        match self.commit(&audit, passed).await {
            Ok(true) => {}
            Ok(false) => debug!(
                worker_id = %self.worker,
                subject = %audit.subject_id(),
                "Audit no longer pending; verdict dropped"
            ),
            Err(e) => error!(
                worker_id = %self.worker,
                subject = %audit.subject_id(),
                error = %e,
                "Failed to commit audit verdict; it stays pending until restart"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::RoutingCache;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAuditQueue, SqliteContactStore};
    use crate::domain::models::{AuditPayload, Contact, ProofElement, QueueConfig, StorageProof};
    use crate::domain::ports::{ContactStore, NullDiscovery};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use sha2::{Digest, Sha256};

    enum FarmerBehavior {
        Honest(Vec<u8>),
        Error,
        Hang,
        Garbage,
    }

    struct MockFarmer {
        behavior: FarmerBehavior,
    }

    #[async_trait]
    impl FarmerClient for MockFarmer {
        async fn get_storage_proof(
            &self,
            _contact: &Contact,
            _data_hash: &str,
            _challenge: &str,
        ) -> Result<StorageProof, RpcError> {
            match &self.behavior {
                FarmerBehavior::Honest(response) => Ok(StorageProof(ProofElement::Branch(vec![
                    ProofElement::Hash(hex::encode(response)),
                ]))),
                FarmerBehavior::Error => Err(RpcError::Transport("connection reset".to_string())),
                FarmerBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(RpcError::Transport("unreachable".to_string()))
                }
                FarmerBehavior::Garbage => Ok(StorageProof(ProofElement::Hash("x".to_string()))),
            }
        }
    }

    fn audit_for(response: &[u8]) -> Audit {
        Audit::new(
            Utc::now(),
            AuditPayload {
                subject_id: "farmer-1".to_string(),
                merkle_root: hex::encode(Sha256::digest(response)),
                merkle_depth: 0,
                challenge: "aa".to_string(),
                data_hash: "bb".to_string(),
            },
        )
    }

    async fn auditor(behavior: FarmerBehavior) -> (Auditor, Arc<SqliteAuditQueue>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let queue = Arc::new(SqliteAuditQueue::new(pool.clone(), QueueConfig::default()));
        let store = Arc::new(SqliteContactStore::new(pool));
        store.upsert(&Contact::new("farmer-1", "127.0.0.1", 4000)).await.unwrap();
        let resolver = Arc::new(ContactResolver::new(
            RoutingCache::default(),
            store,
            Arc::new(NullDiscovery),
        ));
        let auditor = Auditor::new(
            WorkerId::new("w").unwrap(),
            queue.clone(),
            Arc::new(MockFarmer { behavior }),
            resolver,
            Duration::from_millis(100),
        );
        (auditor, queue)
    }

    #[tokio::test]
    async fn test_honest_farmer_passes() {
        let (auditor, _) = auditor(FarmerBehavior::Honest(b"shard".to_vec())).await;
        assert!(auditor.verify(audit_for(b"shard")).await.passed);
    }

    #[tokio::test]
    async fn test_wrong_response_fails() {
        let (auditor, _) = auditor(FarmerBehavior::Honest(b"other".to_vec())).await;
        assert!(!auditor.verify(audit_for(b"shard")).await.passed);
    }

    #[tokio::test]
    async fn test_rpc_error_timeout_and_garbage_fail() {
        for behavior in [FarmerBehavior::Error, FarmerBehavior::Hang, FarmerBehavior::Garbage] {
            let (auditor, _) = auditor(behavior).await;
            assert!(!auditor.verify(audit_for(b"shard")).await.passed);
        }
    }

    #[tokio::test]
    async fn test_unreachable_farmer_route_is_dropped() {
        let (honest, _) = auditor(FarmerBehavior::Honest(b"shard".to_vec())).await;
        honest.verify(audit_for(b"shard")).await;
        assert!(honest.resolver.cache().get("farmer-1").await.is_some());

        let (failing, _) = auditor(FarmerBehavior::Error).await;
        failing.verify(audit_for(b"shard")).await;
        assert!(failing.resolver.cache().get("farmer-1").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_contact_fails() {
        let (auditor, _) = auditor(FarmerBehavior::Honest(b"shard".to_vec())).await;
        let mut audit = audit_for(b"shard");
        audit.payload.subject_id = "stranger".to_string();
        assert!(!auditor.verify(audit).await.passed);
    }

    #[tokio::test]
    async fn test_process_commits_claimed_audit() {
        let (auditor, queue) = auditor(FarmerBehavior::Honest(b"shard".to_vec())).await;
        let audit = audit_for(b"shard");
        queue.enqueue(&[audit.clone()]).await.unwrap();
        queue.promote(DateTime::<Utc>::MIN_UTC, Utc::now()).await.unwrap();

        let claimed = auditor.get().await.unwrap().unwrap();
        auditor.process(claimed).await;

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.pending, 0);
        assert!(auditor.get_blocking(Duration::from_millis(10)).await.unwrap().is_none());
    }
}
