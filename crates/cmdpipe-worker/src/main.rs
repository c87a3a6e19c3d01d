//! Binary entrypoint for the reference `cmdpipe` worker.

use std::io::{self, Write};
use std::process::ExitCode;

use cmdpipe_worker::{ShellExecutor, SignalNotifier, WorkerExit, run_worker};

fn main() -> ExitCode {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    let executor = ShellExecutor::from_env();
    let notifier = SignalNotifier::from_env();
    match run_worker(&mut reader, &mut stdout, &mut stderr, &executor, &notifier) {
        Ok(WorkerExit::Completed) => ExitCode::SUCCESS,
        Ok(WorkerExit::CommandFailed) => ExitCode::FAILURE,
        Err(error) => {
            writeln!(stderr, "{error}").ok();
            ExitCode::FAILURE
        }
    }
}
