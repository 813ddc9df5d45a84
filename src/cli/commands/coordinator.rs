//! `bridge-audit coordinator`

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::adapters::sqlite::SqliteAuditQueue;
use crate::application::{
    shutdown_signal, ConfigWorkerFactory, Coordinator, CoordinatorStats, ProcessLauncher,
    TaskLauncher, WorkerLauncher,
};
use crate::cli::open_store;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, LaunchMode};

#[derive(Args, Debug)]
pub struct CoordinatorArgs {
    /// Run workers as tasks in this process instead of child processes
    #[arg(long)]
    pub in_process: bool,

    /// Do not run the promotion ticker
    #[arg(long)]
    pub no_promotion: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct CoordinatorOutput {
    pub workers: usize,
    pub launches: u64,
    pub restarts: u64,
    pub promotions: u64,
    pub promoted: u64,
}

impl From<(usize, CoordinatorStats)> for CoordinatorOutput {
    fn from((workers, stats): (usize, CoordinatorStats)) -> Self {
        Self {
            workers,
            launches: stats.launches,
            restarts: stats.restarts,
            promotions: stats.promotions,
            promoted: stats.promoted,
        }
    }
}

impl CommandOutput for CoordinatorOutput {
    fn to_human(&self) -> String {
        format!(
            "Coordinator stopped: {} worker(s), {} launch(es), {} restart(s), \
             {} audit(s) promoted in {} pass(es)",
            self.workers, self.launches, self.restarts, self.promoted, self.promotions
        )
    }
}

pub async fn execute(
    args: CoordinatorArgs,
    mut config: Config,
    config_path: Option<std::path::PathBuf>,
    json_mode: bool,
) -> Result<()> {
    if args.in_process {
        config.coordinator.launch_mode = LaunchMode::InProcess;
    }
    if args.no_promotion {
        config.coordinator.promotion.enabled = false;
    }

    let pool = open_store(&config).await?;
    let queue = Arc::new(SqliteAuditQueue::new(pool.clone(), config.queue.clone()));

    let launcher: Arc<dyn WorkerLauncher> = match config.coordinator.launch_mode {
        LaunchMode::Process => Arc::new(
            ProcessLauncher::current_exe(config_path)
                .context("Failed to prepare worker process launcher")?,
        ),
        LaunchMode::InProcess => Arc::new(TaskLauncher::new(Arc::new(ConfigWorkerFactory::new(
            config.clone(),
            pool,
        )))),
    };

    let workers = config.coordinator.workers.len();
    let coordinator = Coordinator::new(config.coordinator, queue, launcher);

    let run = coordinator.run();
    tokio::pin!(run);
    tokio::select! {
        result = &mut run => result?,
        () = shutdown_signal() => {
            info!("Stopping coordinator");
            coordinator.shutdown();
            run.await?;
        }
    }

    output(&CoordinatorOutput::from((workers, coordinator.stats())), json_mode);
    Ok(())
}
