//! One streaming run: open, pipe, spawn, pump, reap.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cmdpipe_config::Config;
use thiserror::Error;
use tracing::{info, info_span};

use crate::framer::{FramerError, LineFramer};
use crate::interrupt::InterruptFlag;
use crate::pipe::{self, PipeError};
use crate::progress::{ProgressReporter, SessionIdentities};
use crate::pump::{CommandPump, PumpError, PumpSummary};
use crate::supervisor::{ExitOutcome, SupervisorError, WorkerHandle, WorkerLauncher};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Errors that end a session.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The command file could not be opened.
    #[error("failed to open command file '{}': {source}", path.display())]
    OpenFile {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The framer rejected its settings.
    #[error(transparent)]
    Framer(#[from] FramerError),
    /// The command pipe could not be created.
    #[error(transparent)]
    Pipe(#[from] PipeError),
    /// The worker could not be spawned or reaped.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
    /// Streaming failed; the worker was still reaped.
    #[error(transparent)]
    Pump(#[from] PumpError),
}

/// What a completed session observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Pump tally.
    pub summary: PumpSummary,
    /// How the worker ended.
    pub outcome: ExitOutcome,
}

/// Wires the framer, pipe, worker and pump together for one command file.
pub struct Session<'a, L> {
    launcher: L,
    interrupt: InterruptFlag,
    reporter: &'a dyn ProgressReporter,
    throttle: Duration,
    chunk_capacity: usize,
}

impl<'a, L: WorkerLauncher> Session<'a, L> {
    /// Creates a session using default pacing and chunking.
    #[must_use]
    pub fn new(launcher: L, interrupt: InterruptFlag, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            launcher,
            interrupt,
            reporter,
            throttle: cmdpipe_config::default_throttle(),
            chunk_capacity: cmdpipe_config::default_chunk_capacity(),
        }
    }

    /// Applies the pacing and chunking settings from `config`.
    #[must_use]
    pub fn configured(self, config: &Config) -> Self {
        self.with_throttle(config.throttle())
            .with_chunk_capacity(config.chunk_capacity())
    }

    /// Sets the pause after each command.
    #[must_use]
    pub const fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the read chunk capacity.
    #[must_use]
    pub const fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Streams `command_file` to a freshly spawned worker.
    ///
    /// Setup failures return before any worker exists. Once the worker is
    /// running it is always reaped, including when streaming fails.
    pub fn run(&self, command_file: &Path) -> Result<SessionReport, SessionError> {
        let span = info_span!(target: SESSION_TARGET, "session", file = %command_file.display());
        let _entered = span.enter();

        let file = File::open(command_file).map_err(|source| SessionError::OpenFile {
            path: command_file.to_path_buf(),
            source: Arc::new(source),
        })?;
        let mut framer = LineFramer::new(file, self.chunk_capacity)?;
        let (reader, writer) = pipe::create()?;
        let worker = self.launcher.spawn(reader)?;

        self.reporter.session_started(&SessionIdentities {
            parent_pid: std::process::id(),
            child_pid: worker.id(),
            file: command_file.to_path_buf(),
        });

        let pump = CommandPump::new(&self.interrupt, self.reporter).with_throttle(self.throttle);
        let pumped = pump.run(&mut framer, writer);
        drop(framer);

        let outcome = worker.wait()?;
        info!(target: SESSION_TARGET, %outcome, "worker finished");
        self.reporter.worker_exited(&outcome);
        self.reporter.finished();

        let summary = pumped?;
        Ok(SessionReport { summary, outcome })
    }
}
