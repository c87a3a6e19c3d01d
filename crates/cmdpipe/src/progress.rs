//! Human-readable progress output for a streaming session.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::framer::CommandRecord;
use crate::supervisor::ExitOutcome;

const PROGRESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::progress");

/// Process identities announced once the worker is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentities {
    /// PID of the streamer.
    pub parent_pid: u32,
    /// PID of the worker.
    pub child_pid: u32,
    /// Command file being streamed.
    pub file: PathBuf,
}

/// Observer notified at each visible step of a session.
pub trait ProgressReporter {
    /// The worker is running and streaming is about to start.
    fn session_started(&self, identities: &SessionIdentities);

    /// `record` passed the interrupt check and is about to be written.
    fn command_sending(&self, record: &CommandRecord);

    /// Streaming stopped because the worker raised an error.
    fn interrupted(&self);

    /// Streaming stopped because the worker closed the pipe.
    fn peer_closed(&self);

    /// The worker has been reaped.
    fn worker_exited(&self, outcome: &ExitOutcome);

    /// The session is over.
    fn finished(&self);
}

/// Writes progress lines to a console stream.
#[derive(Debug)]
pub struct ConsoleReporter<W> {
    out: Mutex<W>,
}

impl<W: Write> ConsoleReporter<W> {
    /// Wraps the stream progress lines are written to.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the wrapped stream.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(target: PROGRESS_TARGET, error = %error, "failed to write progress");
        }
    }
}

impl<W: Write> ProgressReporter for ConsoleReporter<W> {
    fn session_started(&self, identities: &SessionIdentities) {
        self.emit(&format!(
            "Parent PID: {}\nChild PID: {}\nFile: {}\n\n",
            identities.parent_pid,
            identities.child_pid,
            identities.file.display()
        ));
    }

    fn command_sending(&self, record: &CommandRecord) {
        self.emit(&format!(
            "Sending command {}: {}\n",
            record.line_number(),
            record.text()
        ));
    }

    fn interrupted(&self) {
        self.emit("Parent: stopping after worker error\n");
    }

    fn peer_closed(&self) {
        self.emit("Parent: worker closed the pipe\n");
    }

    fn worker_exited(&self, outcome: &ExitOutcome) {
        self.emit(&format!("Parent: worker {outcome}\n"));
    }

    fn finished(&self) {
        self.emit("Parent: done\n");
    }
}
