//! Spawning and reaping of the worker process.
//!
//! [`WorkerLauncher`] and [`WorkerHandle`] form the seam between the session
//! and the operating system. [`ProcessLauncher`] is the production
//! implementation; tests substitute scripted doubles.

mod outcome;
mod process;

use std::ffi::OsString;
use std::io::{self, PipeReader};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use outcome::ExitOutcome;
pub use process::{ChildHandle, ProcessLauncher, resolve_worker_program};

pub(crate) const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");

/// Environment variable carrying the streamer's PID to the worker.
pub const PARENT_PID_ENV: &str = "CMDPIPE_PARENT_PID";

/// Interval between liveness probes while a wait timeout is in force.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Errors raised while spawning or reaping the worker.
#[derive(Debug, Clone, Error)]
pub enum SupervisorError {
    /// The worker process could not be created.
    #[error("failed to spawn worker '{}': {source}", program.to_string_lossy())]
    SpawnFailed {
        /// Program that failed to start.
        program: OsString,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Waiting for the worker failed.
    #[error("failed to wait for worker {pid}: {source}")]
    Wait {
        /// Worker PID.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Starts workers reading commands from a pipe.
pub trait WorkerLauncher {
    /// Handle type returned for a running worker.
    type Handle: WorkerHandle;

    /// Spawns a worker whose stdin is `stdin`.
    ///
    /// The launcher takes ownership of the read end and must release the
    /// streamer's copy once the worker holds its own.
    fn spawn(&self, stdin: PipeReader) -> Result<Self::Handle, SupervisorError>;
}

/// A running worker; consumed by the single permitted wait.
pub trait WorkerHandle {
    /// Process identifier of the worker.
    fn id(&self) -> u32;

    /// Blocks until the worker terminates and decodes how it ended.
    fn wait(self) -> Result<ExitOutcome, SupervisorError>;
}
