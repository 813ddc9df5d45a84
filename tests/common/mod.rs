//! Common test utilities for integration tests
//!
//! Proof fixtures, scripted farmers and store setup shared by the
//! integration test files.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_audit::adapters::cache::RoutingCache;
use bridge_audit::adapters::sqlite::{
    create_migrated_test_pool, initialize_database, SqliteAuditQueue, SqliteContactStore,
};
use bridge_audit::domain::errors::RpcError;
use bridge_audit::domain::models::{
    Audit, AuditPayload, Contact, DatabaseConfig, ProofElement, QueueConfig, StorageProof,
};
use bridge_audit::domain::ports::{ContactStore, FarmerClient, NullDiscovery};
use bridge_audit::services::{ContactResolver, OutcomeBus};

pub const FARMER_ID: &str = "farmer-1";

/// Which side of its parent the sub-proof sits on.
#[derive(Debug, Clone, Copy)]
pub enum Side {
    Left,
    Right,
}

/// A farmer's answer to one challenge plus the root it commits to.
#[derive(Debug, Clone)]
pub struct ProofFixture {
    pub proof: StorageProof,
    pub root: String,
    pub depth: u32,
}

/// Build a proof for `response` with one sibling per level, innermost first.
pub fn build_proof(response: &[u8], siblings: &[(Side, [u8; 32])]) -> ProofFixture {
    let mut node: [u8; 32] = Sha256::digest(response).into();
    let mut element = ProofElement::Branch(vec![ProofElement::Hash(hex::encode(response))]);

    for (side, sibling) in siblings {
        let sibling_hex = ProofElement::Hash(hex::encode(sibling));
        let mut hasher = Sha256::new();
        element = match side {
            Side::Left => {
                hasher.update(node);
                hasher.update(sibling);
                ProofElement::Branch(vec![element, sibling_hex])
            }
            Side::Right => {
                hasher.update(sibling);
                hasher.update(node);
                ProofElement::Branch(vec![sibling_hex, element])
            }
        };
        node = hasher.finalize().into();
    }

    ProofFixture {
        proof: StorageProof(element),
        root: hex::encode(node),
        depth: u32::try_from(siblings.len()).unwrap(),
    }
}

/// Three-level proof whose response is derived from `challenge`.
pub fn fixture_for(challenge: &str) -> ProofFixture {
    let response = format!("response-{challenge}");
    build_proof(
        response.as_bytes(),
        &[
            (Side::Left, [1u8; 32]),
            (Side::Right, [2u8; 32]),
            (Side::Left, [3u8; 32]),
        ],
    )
}

/// An audit whose committed root matches [`fixture_for`] of its challenge.
pub fn audit(challenge: &str, scheduled_at: DateTime<Utc>) -> Audit {
    let fixture = fixture_for(challenge);
    Audit::new(
        scheduled_at,
        AuditPayload {
            subject_id: FARMER_ID.to_string(),
            merkle_root: fixture.root,
            merkle_depth: fixture.depth,
            challenge: challenge.to_string(),
            data_hash: "cd".repeat(20),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmerMode {
    /// Answer every challenge with its valid proof
    Honest,
    /// Fail every request at the transport level
    Unreachable,
    /// Never answer
    Hang,
}

/// Farmer that answers from [`fixture_for`] and counts requests.
pub struct ScriptedFarmer {
    mode: Mutex<FarmerMode>,
    calls: AtomicUsize,
    challenges: Mutex<HashMap<String, usize>>,
    order: Mutex<Vec<String>>,
}

impl ScriptedFarmer {
    pub fn new(mode: FarmerMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            challenges: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: FarmerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Challenges in the order they were requested.
    pub fn call_order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    /// Requests seen for one challenge.
    pub fn calls_for(&self, challenge: &str) -> usize {
        self.challenges
            .lock()
            .unwrap()
            .get(challenge)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl FarmerClient for ScriptedFarmer {
    async fn get_storage_proof(
        &self,
        _contact: &Contact,
        _data_hash: &str,
        challenge: &str,
    ) -> Result<StorageProof, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .challenges
            .lock()
            .unwrap()
            .entry(challenge.to_string())
            .or_default() += 1;
        self.order.lock().unwrap().push(challenge.to_string());

        let mode = *self.mode.lock().unwrap();
        match mode {
            FarmerMode::Honest => Ok(fixture_for(challenge).proof),
            FarmerMode::Unreachable => Err(RpcError::Transport("connection refused".to_string())),
            FarmerMode::Hang => {
                std::future::pending::<()>().await;
                Err(RpcError::Timeout(Duration::MAX))
            }
        }
    }
}

/// In-memory store with the queue wired to an outcome bus.
pub async fn setup_queue() -> (SqlitePool, Arc<SqliteAuditQueue>, Arc<OutcomeBus>) {
    let pool = create_migrated_test_pool().await.unwrap();
    let bus = Arc::new(OutcomeBus::default());
    let queue = Arc::new(
        SqliteAuditQueue::new(pool.clone(), fast_queue_config())
            .with_publisher(Arc::clone(&bus) as _),
    );
    (pool, queue, bus)
}

/// Queue settings that keep tests quick.
pub fn fast_queue_config() -> QueueConfig {
    QueueConfig {
        conflict_initial_backoff_ms: 1,
        conflict_max_backoff_ms: 20,
        conflict_max_elapsed_ms: 10_000,
        claim_poll_interval_ms: 20,
    }
}

/// File-backed store shared by several pools, as separate processes would.
pub async fn file_backed_pool(path: &Path) -> SqlitePool {
    initialize_database(&DatabaseConfig {
        path: path.to_string_lossy().into_owned(),
        max_connections: 4,
    })
    .await
    .unwrap()
}

/// Resolver that knows [`FARMER_ID`].
pub async fn resolver(pool: &SqlitePool) -> Arc<ContactResolver> {
    let store = Arc::new(SqliteContactStore::new(pool.clone()));
    store
        .upsert(&Contact::new(FARMER_ID, "127.0.0.1", 4000))
        .await
        .unwrap();
    Arc::new(ContactResolver::new(
        RoutingCache::default(),
        store,
        Arc::new(NullDiscovery),
    ))
}

/// Poll `predicate` every 10ms until it holds or `timeout` passes.
pub async fn wait_until<F, Fut>(mut predicate: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
