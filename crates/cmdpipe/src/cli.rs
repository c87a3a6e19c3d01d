//! Command-line surface of the streamer.

use std::path::PathBuf;

use clap::Parser;

/// Streams the commands in a file, one per line, to a worker process.
#[derive(Parser, Debug)]
#[command(name = "cmdpipe", version, about)]
pub(crate) struct Cli {
    /// File holding one command per line; blank lines are skipped.
    #[arg(value_name = "COMMAND_FILE")]
    pub(crate) command_file: PathBuf,
}
