//! Command-line interface.

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::adapters::sqlite::{initialize_database, SqliteAuditQueue};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

use commands::{
    coordinator::CoordinatorArgs, enqueue::EnqueueArgs, outcomes::OutcomesArgs,
    promote::PromoteArgs, worker::WorkerArgs,
};

#[derive(Parser, Debug)]
#[command(name = "bridge-audit")]
#[command(about = "Audit scheduling and storage proof verification", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Extra YAML config file, merged over .bridge-audit/config.yaml
    #[arg(short, long, global = true, env = "BRIDGE_AUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Supervise the configured workers and promote due audits
    Coordinator(CoordinatorArgs),
    /// Run a single worker
    Worker(WorkerArgs),
    /// Schedule audits for a storage item
    Enqueue(EnqueueArgs),
    /// Promote due audits from backlog to ready once
    Promote(PromoteArgs),
    /// Show audit counts per queue state
    Status,
    /// List recent audit outcomes
    Outcomes(OutcomesArgs),
}

/// Load configuration honoring `--config`.
pub fn load_config(cli: &Cli) -> Result<Config> {
    ConfigLoader::load(cli.config.as_deref())
}

/// Open the shared store, applying pending migrations.
pub async fn open_store(config: &Config) -> Result<SqlitePool> {
    initialize_database(&config.database)
        .await
        .with_context(|| format!("Failed to open audit store at {}", config.database.path))
}

/// Queue handle for one-shot commands.
pub async fn open_queue(config: &Config) -> Result<SqliteAuditQueue> {
    let pool = open_store(config).await?;
    Ok(SqliteAuditQueue::new(pool, config.queue.clone()))
}

/// Print the error in the selected format and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
