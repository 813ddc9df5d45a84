use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::WorkerId;

/// Project config file, relative to the working directory
pub const PROJECT_CONFIG: &str = ".bridge-audit/config.yaml";

/// Optional local overrides, relative to the working directory
pub const LOCAL_CONFIG: &str = ".bridge-audit/local.yaml";

/// Environment variable prefix; `__` separates nested keys
pub const ENV_PREFIX: &str = "BRIDGE_AUDIT_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Coordinator must supervise at least one worker")]
    NoWorkers,

    #[error("Invalid worker id: {0:?}. Must be non-empty without whitespace")]
    InvalidWorkerId(String),

    #[error("Duplicate worker id: {0}")]
    DuplicateWorkerId(String),

    #[error("Invalid limit for worker {0}: must be at least 1")]
    InvalidWorkerLimit(String),

    #[error(
        "Invalid backoff configuration: conflict_initial_backoff_ms ({0}) \
         must not exceed conflict_max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .bridge-audit/config.yaml (project config)
    /// 3. .bridge-audit/local.yaml (project local overrides, optional)
    /// 4. `extra`, when given (e.g. `--config`)
    /// 5. Environment variables (BRIDGE_AUDIT_* prefix, highest priority)
    pub fn load(extra: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG));

        if let Some(path) = extra {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file only (no env, no project files)
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let queue = &config.queue;
        if queue.conflict_initial_backoff_ms > queue.conflict_max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                queue.conflict_initial_backoff_ms,
                queue.conflict_max_backoff_ms,
            ));
        }
        if queue.claim_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "queue.claim_poll_interval_ms must be positive".to_string(),
            ));
        }

        let coordinator = &config.coordinator;
        if coordinator.workers.is_empty() {
            return Err(ConfigError::NoWorkers);
        }
        let mut seen = HashSet::new();
        for worker in &coordinator.workers {
            if WorkerId::new(worker.id.as_str()).is_err() {
                return Err(ConfigError::InvalidWorkerId(worker.id.clone()));
            }
            if !seen.insert(worker.id.as_str()) {
                return Err(ConfigError::DuplicateWorkerId(worker.id.clone()));
            }
            if worker.limit == 0 {
                return Err(ConfigError::InvalidWorkerLimit(worker.id.clone()));
            }
        }
        if coordinator.promotion.interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "coordinator.promotion.interval_secs must be positive".to_string(),
            ));
        }

        if config.worker.rpc_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "worker.rpc_timeout_secs must be positive".to_string(),
            ));
        }
        if config.worker.routing_cache_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "worker.routing_cache_capacity must be positive".to_string(),
            ));
        }

        for seed in &config.network.discovery_seeds {
            if !(seed.starts_with("http://") || seed.starts_with("https://")) {
                return Err(ConfigError::ValidationFailed(format!(
                    "discovery seed '{seed}' must be an http(s) URL"
                )));
            }
        }

        Ok(())
    }
}
