//! Worker launch strategies used by the coordinator.
//!
//! [`ProcessLauncher`] runs each worker as a child OS process
//! (`bridge-audit worker --id <id> --limit <n>`). [`TaskLauncher`] runs
//! workers as tokio tasks inside the coordinator process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use sqlx::SqlitePool;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::worker::Worker;
use crate::domain::models::{Config, WorkerConfig, WorkerId};

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exited with a status code (`None` when killed by a signal)
    Exited(Option<i32>),
    /// Crashed or could not be awaited
    Failed(String),
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(Some(code)) => write!(f, "exited with status {code}"),
            Self::Exited(None) => f.write_str("terminated by signal"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// A running worker.
#[async_trait]
pub trait WorkerHandle: Send {
    /// Wait for the worker to exit on its own.
    async fn wait(&mut self) -> WorkerExit;

    /// Ask the worker to stop, forcing it after `grace`.
    async fn terminate(&mut self, grace: Duration) -> WorkerExit;
}

/// Starts workers for the coordinator.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, worker: &WorkerConfig) -> Result<Box<dyn WorkerHandle>>;
}

// ============================================================================
// OS processes
// ============================================================================

pub struct ProcessLauncher {
    program: PathBuf,
    config_path: Option<PathBuf>,
}

impl ProcessLauncher {
    /// Launch workers by re-executing the current binary.
    pub fn current_exe(config_path: Option<PathBuf>) -> Result<Self> {
        let program = std::env::current_exe().context("Failed to locate current executable")?;
        Ok(Self::new(program, config_path))
    }

    pub fn new(program: PathBuf, config_path: Option<PathBuf>) -> Self {
        Self {
            program,
            config_path,
        }
    }

    fn command(&self, worker: &WorkerConfig) -> Command {
        let mut command = Command::new(&self.program);
        if let Some(path) = &self.config_path {
            command.arg("--config").arg(path);
        }
        command
            .arg("worker")
            .arg("--id")
            .arg(&worker.id)
            .arg("--limit")
            .arg(worker.limit.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, worker: &WorkerConfig) -> Result<Box<dyn WorkerHandle>> {
        let child = self
            .command(worker)
            .spawn()
            .with_context(|| format!("Failed to spawn worker {}", worker.id))?;
        info!(worker_id = %worker.id, pid = ?child.id(), "Spawned worker process");
        Ok(Box::new(ProcessHandle {
            worker_id: worker.id.clone(),
            child,
        }))
    }
}

struct ProcessHandle {
    worker_id: String,
    child: Child,
}

#[async_trait]
impl WorkerHandle for ProcessHandle {
    async fn wait(&mut self) -> WorkerExit {
        match self.child.wait().await {
            Ok(status) => WorkerExit::Exited(status.code()),
            Err(e) => WorkerExit::Failed(e.to_string()),
        }
    }

    async fn terminate(&mut self, grace: Duration) -> WorkerExit {
        if let Some(pid) = self.child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                warn!(worker_id = %self.worker_id, error = %e, "Failed to send SIGTERM");
            }
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => WorkerExit::Exited(status.code()),
            Ok(Err(e)) => WorkerExit::Failed(e.to_string()),
            Err(_) => {
                warn!(worker_id = %self.worker_id, "Worker ignored SIGTERM, killing");
                if let Err(e) = self.child.kill().await {
                    error!(worker_id = %self.worker_id, error = %e, "Failed to kill worker");
                }
                WorkerExit::Exited(None)
            }
        }
    }
}

// ============================================================================
// In-process tasks
// ============================================================================

/// Builds the worker a [`TaskLauncher`] runs.
#[async_trait]
pub trait WorkerFactory: Send + Sync {
    async fn build(&self, worker: &WorkerConfig) -> Result<Worker>;
}

/// Builds workers against the shared pool and the real network adapters.
pub struct ConfigWorkerFactory {
    config: Config,
    pool: SqlitePool,
}

impl ConfigWorkerFactory {
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        Self { config, pool }
    }
}

#[async_trait]
impl WorkerFactory for ConfigWorkerFactory {
    async fn build(&self, worker: &WorkerConfig) -> Result<Worker> {
        let id = WorkerId::new(worker.id.as_str())?;
        Worker::from_config(&self.config, self.pool.clone(), id, worker.limit)
    }
}

pub struct TaskLauncher {
    factory: Arc<dyn WorkerFactory>,
}

impl TaskLauncher {
    pub fn new(factory: Arc<dyn WorkerFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl WorkerLauncher for TaskLauncher {
    async fn launch(&self, worker: &WorkerConfig) -> Result<Box<dyn WorkerHandle>> {
        let worker = Arc::new(self.factory.build(worker).await?);
        let task = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run().await }
        });
        info!(worker_id = %worker.id(), "Started in-process worker");
        Ok(Box::new(TaskHandle { worker, task }))
    }
}

struct TaskHandle {
    worker: Arc<Worker>,
    task: JoinHandle<Result<()>>,
}

fn task_exit(result: Result<Result<()>, tokio::task::JoinError>) -> WorkerExit {
    match result {
        Ok(Ok(())) => WorkerExit::Exited(Some(0)),
        Ok(Err(e)) => WorkerExit::Failed(format!("{e:#}")),
        Err(e) => WorkerExit::Failed(e.to_string()),
    }
}

#[async_trait]
impl WorkerHandle for TaskHandle {
    async fn wait(&mut self) -> WorkerExit {
        task_exit((&mut self.task).await)
    }

    async fn terminate(&mut self, grace: Duration) -> WorkerExit {
        self.worker.shutdown();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(result) => task_exit(result),
            Err(_) => {
                warn!(worker_id = %self.worker.id(), "Worker did not stop in time, aborting");
                self.task.abort();
                WorkerExit::Exited(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker_config(id: &str) -> WorkerConfig {
        WorkerConfig {
            id: id.to_string(),
            limit: 3,
        }
    }

    #[test]
    fn test_process_command_line() {
        let launcher = ProcessLauncher::new(
            PathBuf::from("/usr/bin/bridge-audit"),
            Some(PathBuf::from("/etc/bridge-audit.yaml")),
        );
        let command = launcher.command(&worker_config("worker-7"));
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["--config", "/etc/bridge-audit.yaml", "worker", "--id", "worker-7", "--limit", "3"]
        );
    }

    #[tokio::test]
    async fn test_process_handle_reports_exit_code() {
        let launcher = ProcessLauncher::new(PathBuf::from("/bin/sh"), None);
        // `/bin/sh worker ...` fails to open a script named "worker"
        let mut handle = launcher.launch(&worker_config("w")).await.unwrap();
        match handle.wait().await {
            WorkerExit::Exited(Some(code)) => assert_ne!(code, 0),
            other => panic!("unexpected exit: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_stops_long_running_process() {
        let mut child = Command::new("sleep");
        child.arg("30").kill_on_drop(true);
        let mut handle = ProcessHandle {
            worker_id: "sleeper".to_string(),
            child: child.spawn().unwrap(),
        };

        let exit = handle.terminate(Duration::from_secs(5)).await;
        assert_eq!(exit, WorkerExit::Exited(None));
    }

    #[test]
    fn test_exit_display() {
        assert_eq!(WorkerExit::Exited(Some(2)).to_string(), "exited with status 2");
        assert_eq!(WorkerExit::Exited(None).to_string(), "terminated by signal");
    }
}
