//! Binary entry point for the `cmdpipe` command streamer.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    cmdpipe::run(std::env::args_os(), io::stdout(), &mut stderr)
}
