use serde::{Deserialize, Serialize};

/// Main configuration structure for the audit engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Audit queue tuning
    #[serde(default)]
    pub queue: QueueConfig,

    /// Coordinator supervision and promotion
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Per-worker dispatch settings
    #[serde(default)]
    pub worker: WorkerSettings,

    /// Farmer network access
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".bridge-audit/audits.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Directory for rolling log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
            log_dir: None,
        }
    }
}

/// Audit queue tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// First delay after an optimistic-lock conflict
    #[serde(default = "default_conflict_initial_backoff_ms")]
    pub conflict_initial_backoff_ms: u64,

    /// Upper bound for a single conflict backoff delay
    #[serde(default = "default_conflict_max_backoff_ms")]
    pub conflict_max_backoff_ms: u64,

    /// Give up retrying a conflicting transition after this long
    #[serde(default = "default_conflict_max_elapsed_ms")]
    pub conflict_max_elapsed_ms: u64,

    /// How often an idle blocking claim re-checks the store
    #[serde(default = "default_claim_poll_interval_ms")]
    pub claim_poll_interval_ms: u64,
}

const fn default_conflict_initial_backoff_ms() -> u64 {
    10
}

const fn default_conflict_max_backoff_ms() -> u64 {
    1_000
}

const fn default_conflict_max_elapsed_ms() -> u64 {
    30_000
}

const fn default_claim_poll_interval_ms() -> u64 {
    1_000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            conflict_initial_backoff_ms: default_conflict_initial_backoff_ms(),
            conflict_max_backoff_ms: default_conflict_max_backoff_ms(),
            conflict_max_elapsed_ms: default_conflict_max_elapsed_ms(),
            claim_poll_interval_ms: default_claim_poll_interval_ms(),
        }
    }
}

/// Identity and concurrency of one supervised worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Stable worker identity; keys the worker's Pending partition
    pub id: String,

    /// Maximum concurrent verifications
    #[serde(default = "default_worker_limit")]
    pub limit: usize,
}

const fn default_worker_limit() -> usize {
    10
}

/// Time-based promotion of due audits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PromotionConfig {
    /// Run promotion from this coordinator
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between promotion passes
    #[serde(default = "default_promotion_interval_secs")]
    pub interval_secs: u64,

    /// Admit audits this many seconds before they are strictly due
    #[serde(default = "default_promotion_padding_secs")]
    pub padding_secs: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_promotion_interval_secs() -> u64 {
    10
}

const fn default_promotion_padding_secs() -> u64 {
    10
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_promotion_interval_secs(),
            padding_secs: default_promotion_padding_secs(),
        }
    }
}

/// How the coordinator runs its workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// One OS process per worker
    #[default]
    Process,
    /// Supervised tasks inside the coordinator process
    InProcess,
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Workers to supervise
    #[serde(default = "default_workers")]
    pub workers: Vec<WorkerConfig>,

    /// Promotion settings
    #[serde(default)]
    pub promotion: PromotionConfig,

    /// Process or in-process workers
    #[serde(default)]
    pub launch_mode: LaunchMode,

    /// Delay before respawning an exited worker
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Time a worker gets to exit after SIGTERM before it is killed
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_workers() -> Vec<WorkerConfig> {
    vec![WorkerConfig {
        id: "worker-0".to_string(),
        limit: default_worker_limit(),
    }]
}

const fn default_restart_delay_ms() -> u64 {
    500
}

const fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            promotion: PromotionConfig::default(),
            launch_mode: LaunchMode::default(),
            restart_delay_ms: default_restart_delay_ms(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

/// Settings shared by every worker
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerSettings {
    /// Deadline for a single storage proof request
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// Recently seen contacts used to seed the routing cache at startup
    #[serde(default = "default_seed_contacts")]
    pub seed_contacts: usize,

    /// Time in-flight audits get to finish on shutdown
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Delay before claiming again after a store error
    #[serde(default = "default_claim_error_backoff_ms")]
    pub claim_error_backoff_ms: u64,

    /// Maximum contacts held by the routing cache
    #[serde(default = "default_routing_cache_capacity")]
    pub routing_cache_capacity: u64,

    /// Routing cache entry lifetime
    #[serde(default = "default_routing_cache_ttl_secs")]
    pub routing_cache_ttl_secs: u64,
}

const fn default_rpc_timeout_secs() -> u64 {
    30
}

const fn default_seed_contacts() -> usize {
    100
}

const fn default_drain_timeout_secs() -> u64 {
    30
}

const fn default_claim_error_backoff_ms() -> u64 {
    2_000
}

const fn default_routing_cache_capacity() -> u64 {
    10_000
}

const fn default_routing_cache_ttl_secs() -> u64 {
    3_600
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: default_rpc_timeout_secs(),
            seed_contacts: default_seed_contacts(),
            drain_timeout_secs: default_drain_timeout_secs(),
            claim_error_backoff_ms: default_claim_error_backoff_ms(),
            routing_cache_capacity: default_routing_cache_capacity(),
            routing_cache_ttl_secs: default_routing_cache_ttl_secs(),
        }
    }
}

/// Farmer network access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NetworkConfig {
    /// Base URLs queried for contacts the local tiers do not know
    #[serde(default)]
    pub discovery_seeds: Vec<String>,

    /// Per-request HTTP timeout for discovery lookups
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

const fn default_http_timeout_secs() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            discovery_seeds: Vec::new(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}
