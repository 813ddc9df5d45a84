//! `bridge-audit worker --id <id> --limit <n>`

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::application::{shutdown_signal, Worker};
use crate::cli::open_store;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, WorkerId};

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Stable worker identity
    #[arg(long)]
    pub id: String,

    /// Maximum concurrent verifications (defaults to the configured limit for this id)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, serde::Serialize)]
pub struct WorkerOutput {
    pub worker_id: String,
    pub limit: usize,
    pub processed: u64,
}

impl CommandOutput for WorkerOutput {
    fn to_human(&self) -> String {
        format!(
            "Worker {} stopped after processing {} audit(s)",
            self.worker_id, self.processed
        )
    }
}

/// Limit from the command line, else from the coordinator's worker list.
pub fn resolve_limit(args: &WorkerArgs, config: &Config) -> usize {
    args.limit
        .or_else(|| {
            config
                .coordinator
                .workers
                .iter()
                .find(|w| w.id == args.id)
                .map(|w| w.limit)
        })
        .unwrap_or(10)
        .max(1)
}

pub async fn execute(args: WorkerArgs, config: Config, json_mode: bool) -> Result<()> {
    let id = WorkerId::new(args.id.as_str())?;
    let limit = resolve_limit(&args, &config);

    let pool = open_store(&config).await?;
    let worker = Worker::from_config(&config, pool, id, limit)?;

    let run = worker.run();
    tokio::pin!(run);
    tokio::select! {
        result = &mut run => result?,
        () = shutdown_signal() => {
            info!(worker_id = %worker.id(), "Stopping worker");
            worker.shutdown();
            run.await?;
        }
    }

    output(
        &WorkerOutput {
            worker_id: worker.id().to_string(),
            limit,
            processed: worker.processed(),
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::WorkerConfig;

    fn args(id: &str, limit: Option<usize>) -> WorkerArgs {
        WorkerArgs {
            id: id.to_string(),
            limit,
        }
    }

    #[test]
    fn test_resolve_limit() {
        let mut config = Config::default();
        config.coordinator.workers = vec![WorkerConfig {
            id: "alpha".to_string(),
            limit: 4,
        }];

        assert_eq!(resolve_limit(&args("alpha", Some(2)), &config), 2);
        assert_eq!(resolve_limit(&args("alpha", None), &config), 4);
        assert_eq!(resolve_limit(&args("other", None), &config), 10);
        assert_eq!(resolve_limit(&args("alpha", Some(0)), &config), 1);
    }
}
