pub mod auditor;
pub mod contact_resolver;
pub mod job_factory;
pub mod merkle;
pub mod outcome_bus;

pub use auditor::{Auditor, VerificationResult};
pub use contact_resolver::{ContactResolver, ContactTier};
pub use job_factory::create_jobs_from_storage_item;
pub use merkle::{compute_root, verify_storage_proof, ProofRoot, MAX_PROOF_DEPTH};
pub use outcome_bus::{OutcomeBus, OutcomeBusConfig};
