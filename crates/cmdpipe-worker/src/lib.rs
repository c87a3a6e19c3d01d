//! Reference worker for the `cmdpipe` command streamer.
//!
//! The worker reads newline-delimited commands from stdin and runs each one
//! through a shell. The first command that cannot be started or exits
//! unsuccessfully is fatal: the worker sends `SIGUSR1` to the streamer, says
//! why on stderr and exits with status 1. End of input is a clean exit.
//!
//! Commands run with stdin detached so they cannot consume the stream meant
//! for the worker.

#[cfg(test)]
mod tests;

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid, getppid};
use thiserror::Error;

/// Environment variable carrying the streamer's PID.
pub const PARENT_PID_ENV: &str = "CMDPIPE_PARENT_PID";

/// Environment variable overriding the shell used to run commands.
pub const SHELL_ENV: &str = "CMDPIPE_WORKER_SHELL";

/// Shell used when [`SHELL_ENV`] is unset.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// How a single command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Exit status zero.
    Succeeded,
    /// Non-zero exit status.
    ExitedWithCode(i32),
    /// Terminated by a signal.
    KilledBySignal(i32),
}

impl CommandStatus {
    /// Classifies a raw exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => Self::Succeeded,
            (Some(code), _) => Self::ExitedWithCode(code),
            (None, Some(signal)) => Self::KilledBySignal(signal),
            (None, None) => Self::ExitedWithCode(-1),
        }
    }

    /// Whether the command succeeded.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::ExitedWithCode(code) => write!(f, "exited with code {code}"),
            Self::KilledBySignal(signal) => write!(f, "killed by signal {signal}"),
        }
    }
}

/// Runs one command line.
pub trait CommandExecutor {
    /// Runs `command` to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be started.
    fn execute(&self, command: &str) -> Result<CommandStatus, ExecuteError>;
}

/// Tells the streamer that a command failed.
pub trait FailureNotifier {
    /// Delivers the failure notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the streamer could not be reached.
    fn notify(&self) -> Result<(), NotifyError>;
}

/// Errors raised while starting a command.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The shell could not be spawned.
    #[error("failed to start shell '{shell}': {source}")]
    Spawn {
        /// Shell that failed to start.
        shell: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while notifying the streamer.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The signal could not be delivered.
    #[error("failed to signal parent {pid}: {source}")]
    Signal {
        /// Target process.
        pid: i32,
        /// Underlying errno.
        #[source]
        source: Errno,
    },
}

/// Errors that stop the worker without a command failure.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Reading the command stream failed.
    #[error("failed to read commands: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing a report failed.
    #[error("failed to write report: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// How the worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Input ended and every command succeeded.
    Completed,
    /// A command failed and the streamer was notified.
    CommandFailed,
}

/// Executes commands through `<shell> -c <command>`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: OsString,
}

impl ShellExecutor {
    /// Uses `shell` to run commands.
    #[must_use]
    pub fn new(shell: impl Into<OsString>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Uses [`SHELL_ENV`], falling back to [`DEFAULT_SHELL`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(env::var_os(SHELL_ENV).unwrap_or_else(|| OsString::from(DEFAULT_SHELL)))
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str) -> Result<CommandStatus, ExecuteError> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| ExecuteError::Spawn {
                shell: self.shell.to_string_lossy().into_owned(),
                source,
            })?;
        Ok(CommandStatus::from_status(status))
    }
}

/// Notifies the streamer with `SIGUSR1`.
#[derive(Debug, Clone, Copy)]
pub struct SignalNotifier {
    parent: Pid,
}

impl SignalNotifier {
    /// Targets `parent`.
    #[must_use]
    pub const fn new(parent: Pid) -> Self {
        Self { parent }
    }

    /// Targets [`PARENT_PID_ENV`], or the parent process when it is unset
    /// or malformed.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(parent_pid(env::var(PARENT_PID_ENV).ok().as_deref()))
    }

    /// Process that will be signalled.
    #[must_use]
    pub const fn parent(&self) -> Pid {
        self.parent
    }
}

impl FailureNotifier for SignalNotifier {
    fn notify(&self) -> Result<(), NotifyError> {
        signal::kill(self.parent, Signal::SIGUSR1).map_err(|source| NotifyError::Signal {
            pid: self.parent.as_raw(),
            source,
        })
    }
}

/// Resolves the streamer PID from an optional override.
#[must_use]
pub fn parent_pid(value: Option<&str>) -> Pid {
    value
        .and_then(|text| text.trim().parse::<i32>().ok())
        .filter(|pid| *pid > 1)
        .map_or_else(getppid, Pid::from_raw)
}

/// Reads commands from `input` until EOF or the first failure.
///
/// Progress goes to `stdout`; the failure report goes to `stderr`. A failed
/// notification is reported but does not change the outcome.
///
/// # Errors
///
/// Returns an error if reading the input or writing a report fails.
pub fn run_worker<R, W, E>(
    input: &mut R,
    stdout: &mut W,
    stderr: &mut E,
    executor: &dyn CommandExecutor,
    notifier: &dyn FailureNotifier,
) -> Result<WorkerExit, WorkerError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut line = Vec::new();
    let mut received = 0_usize;
    loop {
        line.clear();
        let read = input
            .read_until(b'\n', &mut line)
            .map_err(|source| WorkerError::Read { source })?;
        if read == 0 {
            return Ok(WorkerExit::Completed);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.is_empty() {
            continue;
        }
        received += 1;
        let command = String::from_utf8_lossy(&line);

        report(stdout, format_args!("Child: running command {received}: {command}"))?;
        let failure = match executor.execute(&command) {
            Ok(status) if status.is_success() => None,
            Ok(status) => Some(status.to_string()),
            Err(error) => Some(error.to_string()),
        };
        let Some(reason) = failure else {
            report(stdout, format_args!("Child: command {received} succeeded"))?;
            continue;
        };

        if let Err(error) = notifier.notify() {
            report(stderr, format_args!("Child: {error}"))?;
        }
        report(
            stderr,
            format_args!("Child: command {received} failed ({reason}): {command}"),
        )?;
        return Ok(WorkerExit::CommandFailed);
    }
}

fn report(out: &mut impl Write, message: fmt::Arguments<'_>) -> Result<(), WorkerError> {
    writeln!(out, "{message}")
        .and_then(|()| out.flush())
        .map_err(|source| WorkerError::Write { source })
}
