//! `bridge-audit outcomes [--failed] [--limit N]`

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::open_queue;
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Audit, Config, OutcomeChannel};
use crate::domain::ports::AuditQueue;

#[derive(Args, Debug)]
pub struct OutcomesArgs {
    /// Show failed audits instead of passed ones
    #[arg(long)]
    pub failed: bool,

    /// Maximum number of outcomes to display
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct OutcomesOutput {
    pub channel: OutcomeChannel,
    pub audits: Vec<Audit>,
}

impl CommandOutput for OutcomesOutput {
    fn to_human(&self) -> String {
        if self.audits.is_empty() {
            return format!("No {} outcomes found.", self.channel);
        }

        let mut table = list_table(&["scheduled", "subject", "data hash", "challenge"]);
        for audit in &self.audits {
            table.add_row(vec![
                audit.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                truncate(audit.subject_id(), 20),
                truncate(&audit.payload.data_hash, 16),
                truncate(&audit.payload.challenge, 16),
            ]);
        }
        format!("{} {} outcome(s):\n{table}", self.audits.len(), self.channel)
    }
}

pub async fn execute(args: OutcomesArgs, config: Config, json_mode: bool) -> Result<()> {
    let passed = !args.failed;
    let queue = open_queue(&config).await?;
    let audits = queue
        .list_outcomes(passed, args.limit)
        .await
        .context("Failed to list outcomes")?;

    output(
        &OutcomesOutput {
            channel: OutcomeChannel::for_outcome(passed),
            audits,
        },
        json_mode,
    );
    Ok(())
}
