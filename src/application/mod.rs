pub mod coordinator;
pub mod signals;
pub mod worker;
pub mod worker_launcher;

pub use coordinator::{Coordinator, CoordinatorStats};
pub use signals::shutdown_signal;
pub use worker::Worker;
pub use worker_launcher::{
    ConfigWorkerFactory, ProcessLauncher, TaskLauncher, WorkerExit, WorkerFactory, WorkerHandle,
    WorkerLauncher,
};
