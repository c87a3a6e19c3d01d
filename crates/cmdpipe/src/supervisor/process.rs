use std::env;
use std::ffi::OsString;
use std::io::PipeReader;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cmdpipe_config::{Config, DEFAULT_WORKER_BINARY};
use tracing::{debug, info, warn};

use super::{
    ExitOutcome, PARENT_PID_ENV, SUPERVISOR_TARGET, SupervisorError, WAIT_POLL_INTERVAL,
    WorkerHandle, WorkerLauncher,
};

/// Launches the configured worker program as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: OsString,
    args: Vec<OsString>,
    wait_timeout: Option<Duration>,
}

impl ProcessLauncher {
    /// Creates a launcher for `program` with `args`.
    #[must_use]
    pub fn new<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            wait_timeout: None,
        }
    }

    /// Builds a launcher from the worker settings in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let program = resolve_worker_program(config.worker_program());
        Self::new(program, config.worker_args().iter().map(OsString::from))
            .with_wait_timeout(config.wait_timeout())
    }

    /// Bounds the final wait; `None` waits indefinitely.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Program this launcher starts.
    #[must_use]
    pub fn program(&self) -> &OsString {
        &self.program
    }
}

impl WorkerLauncher for ProcessLauncher {
    type Handle = ChildHandle;

    fn spawn(&self, stdin: PipeReader) -> Result<ChildHandle, SupervisorError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .env(PARENT_PID_ENV, std::process::id().to_string());

        let child = command
            .spawn()
            .map_err(|source| SupervisorError::SpawnFailed {
                program: self.program.clone(),
                source: Arc::new(source),
            })?;
        // Dropping the command releases the streamer's copy of the read end.
        drop(command);

        info!(
            target: SUPERVISOR_TARGET,
            pid = child.id(),
            program = %self.program.to_string_lossy(),
            "worker spawned"
        );
        Ok(ChildHandle {
            child,
            wait_timeout: self.wait_timeout,
        })
    }
}

/// Handle to a spawned worker process.
#[derive(Debug)]
pub struct ChildHandle {
    child: Child,
    wait_timeout: Option<Duration>,
}

impl WorkerHandle for ChildHandle {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn wait(mut self) -> Result<ExitOutcome, SupervisorError> {
        let pid = self.child.id();
        let status = match self.wait_timeout {
            None => self.child.wait(),
            Some(timeout) => wait_with_timeout(&mut self.child, timeout),
        }
        .map_err(|source| SupervisorError::Wait {
            pid,
            source: Arc::new(source),
        })?;

        let outcome = ExitOutcome::from_status(status);
        debug!(target: SUPERVISOR_TARGET, pid, %outcome, "worker reaped");
        Ok(outcome)
    }
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if start.elapsed() > timeout {
            warn!(
                target: SUPERVISOR_TARGET,
                pid = child.id(),
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "worker did not exit in time, killing process"
            );
            child.kill()?;
            return child.wait();
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

/// Picks the worker program: explicit setting, sibling binary, then `PATH`.
#[must_use]
pub fn resolve_worker_program(configured: Option<&str>) -> OsString {
    if let Some(program) = configured {
        return OsString::from(program);
    }
    sibling_worker()
        .map(PathBuf::into_os_string)
        .unwrap_or_else(|| OsString::from(DEFAULT_WORKER_BINARY))
}

fn sibling_worker() -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let candidate = exe.parent()?.join(DEFAULT_WORKER_BINARY);
    candidate.is_file().then_some(candidate)
}
