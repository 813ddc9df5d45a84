//! `bridge-audit promote [--padding-secs N]`

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Args;

use crate::cli::open_queue;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::AuditQueue;

#[derive(Args, Debug)]
pub struct PromoteArgs {
    /// Also promote audits due within this many seconds (defaults to the configured padding)
    #[arg(long)]
    pub padding_secs: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct PromoteOutput {
    pub moved: u64,
    pub committed: bool,
    pub cutoff: DateTime<Utc>,
}

impl CommandOutput for PromoteOutput {
    fn to_human(&self) -> String {
        if self.committed {
            format!(
                "Promoted {} audit(s) due by {}",
                self.moved,
                self.cutoff.to_rfc3339()
            )
        } else {
            format!("No audits due by {}", self.cutoff.to_rfc3339())
        }
    }
}

/// Latest schedule time promoted by a pass at `now`.
pub fn cutoff(now: DateTime<Utc>, padding_secs: u64) -> DateTime<Utc> {
    i64::try_from(padding_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|padding| now.checked_add_signed(padding))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub async fn execute(args: PromoteArgs, config: Config, json_mode: bool) -> Result<()> {
    let padding = args
        .padding_secs
        .unwrap_or(config.coordinator.promotion.padding_secs);
    let stop = cutoff(Utc::now(), padding);

    let queue = open_queue(&config).await?;
    let (moved, committed) = queue
        .promote(DateTime::<Utc>::MIN_UTC, stop)
        .await
        .context("Failed to promote due audits")?;

    output(
        &PromoteOutput {
            moved,
            committed,
            cutoff: stop,
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff() {
        let now = Utc::now();
        assert_eq!(cutoff(now, 0), now);
        assert_eq!(cutoff(now, 10), now + Duration::seconds(10));
        assert_eq!(cutoff(now, u64::MAX), DateTime::<Utc>::MAX_UTC);
    }
}
