//! Test doubles shared by the streamer suites.

mod streams;
mod launcher;

pub use streams::{EintrReader, FailingReader, RecordingSink, RejectingSink, SinkProbe};
pub use launcher::{LaunchProbe, SCRIPTED_PID, ScriptedLauncher};
pub use reporter::{ProgressEvent, RecordingReporter};

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

/// Writes `contents` to a command file inside `dir`.
pub fn write_command_file(dir: &TempDir, contents: &[u8]) -> PathBuf {
    let path = dir.path().join("commands.txt");
    fs::write(&path, contents).expect("write command file");
    path
}
