//! `bridge-audit status`

use anyhow::{Context, Result};

use crate::cli::open_queue;
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{Config, QueueStats};
use crate::domain::ports::AuditQueue;

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    pub database: String,
    #[serde(flatten)]
    pub stats: QueueStats,
    pub total: u64,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["state", "audits"]);
        for (state, count) in [
            ("backlog", self.stats.backlog),
            ("ready", self.stats.ready),
            ("pending", self.stats.pending),
            ("passed", self.stats.passed),
            ("failed", self.stats.failed),
        ] {
            table.add_row(vec![state.to_string(), count.to_string()]);
        }
        format!("Audit store: {}\n{table}\n\n{} audit(s) total", self.database, self.total)
    }
}

pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let queue = open_queue(&config).await?;
    let stats = queue.stats().await.context("Failed to read queue stats")?;

    output(
        &StatusOutput {
            database: config.database.path,
            total: stats.total(),
            stats,
        },
        json_mode,
    );
    Ok(())
}
