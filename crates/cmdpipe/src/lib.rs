//! Streams commands from a file to a worker process over an anonymous pipe.
//!
//! The streamer reads the command file in fixed-size chunks, frames it into
//! newline-terminated records, and writes each non-blank record to the
//! worker's stdin with a fixed pause between commands. The worker reports a
//! fatal failure out of band by sending `SIGUSR1` to the streamer; the
//! streamer then stops sending, closes the pipe, and waits for the worker to
//! exit on its own.
//!
//! The pieces, leaves first:
//!
//! - [`framer`] turns chunked reads into records, carrying partial lines
//!   across chunk boundaries.
//! - [`pipe`] owns the one-way channel and its single writer.
//! - [`interrupt`] installs the signal handler and exposes the abort latch.
//! - [`supervisor`] spawns and reaps the worker and decodes its exit status.
//! - [`pump`] is the read/poll/send/throttle loop.
//! - [`session`] sequences the above for one command file.
//!
//! [`run`] is the binary entry point: it parses the single positional
//! argument, loads configuration, initialises telemetry, installs the
//! handler and runs a session. The worker's exit status is reported on
//! stdout but never propagated; the streamer exits non-zero only for its own
//! failures.

mod bootstrap;
mod cli;
mod errors;
pub mod framer;
pub mod interrupt;
pub mod pipe;
pub mod progress;
pub mod pump;
pub mod session;
pub mod supervisor;
pub mod telemetry;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use errors::AppError;
pub use framer::{CommandRecord, FramerError, LineFramer};
pub use interrupt::{INTERRUPT_SIGNAL, InterruptFlag, InterruptGuard};
pub use pipe::{CommandWriter, PipeError, SendError};
pub use progress::{ConsoleReporter, ProgressReporter, SessionIdentities};
pub use pump::{CommandPump, PumpError, PumpSummary, StopReason};
pub use session::{Session, SessionError, SessionReport};
pub use supervisor::{
    ChildHandle, ExitOutcome, ProcessLauncher, SupervisorError, WorkerHandle, WorkerLauncher,
};

use crate::cli::Cli;

const RUN_TARGET: &str = env!("CARGO_PKG_NAME");

/// Runs the streamer with the process configuration sources.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &SystemConfigLoader)
}

/// Runs the streamer with an injected configuration loader.
///
/// Progress lines go to `stdout`; fatal diagnostics go to `stderr`.
#[must_use]
pub fn run_with_loader<I, W, E, L>(args: I, stdout: W, stderr: &mut E, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader + ?Sized,
{
    match execute(args, stdout, loader) {
        Ok(exit_code) => exit_code,
        Err(AppError::CliUsage(usage)) => {
            write!(stderr, "{usage}").ok();
            ExitCode::FAILURE
        }
        Err(error) => {
            writeln!(stderr, "error: {error}").ok();
            ExitCode::FAILURE
        }
    }
}

fn execute<I, W, L>(args: I, mut stdout: W, loader: &L) -> Result<ExitCode, AppError>
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    L: ConfigLoader + ?Sized,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            write!(stdout, "{error}").ok();
            return Ok(ExitCode::SUCCESS);
        }
        Err(error) => return Err(AppError::CliUsage(error)),
    };

    let config = loader.load().map_err(AppError::LoadConfiguration)?;
    config.validate()?;
    telemetry::initialise(&config)?;

    let flag = InterruptFlag::new();
    let guard = interrupt::install(&flag)?;
    let reporter = ConsoleReporter::new(stdout);
    let launcher = ProcessLauncher::from_config(&config);
    let report = Session::new(launcher, flag, &reporter)
        .configured(&config)
        .run(&cli.command_file)?;
    drop(guard);

    info!(
        target: RUN_TARGET,
        sent = report.summary.sent,
        stop = ?report.summary.stop,
        outcome = %report.outcome,
        "run complete"
    );
    Ok(ExitCode::SUCCESS)
}
