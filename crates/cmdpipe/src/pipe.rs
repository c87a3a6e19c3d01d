//! The one-way command channel between the streamer and its worker.
//!
//! [`create`] returns the read end, destined for the worker's stdin, and a
//! [`CommandWriter`] wrapping the write end. Both descriptors are
//! close-on-exec, so the only copy of the read end the worker receives is the
//! one installed as its stdin, and the write end never leaks into it.

use std::io::{self, PipeReader, PipeWriter, Write};
use std::sync::Arc;

use nix::libc;
use thiserror::Error;
use tracing::{debug, warn};

const PIPE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipe");

/// Errors raised while allocating the channel.
#[derive(Debug, Clone, Error)]
pub enum PipeError {
    /// The process or system descriptor table is full.
    #[error("no descriptors left to create the command pipe: {source}")]
    ResourceExhausted {
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Any other allocation failure.
    #[error("failed to create the command pipe: {source}")]
    Create {
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl From<io::Error> for PipeError {
    fn from(source: io::Error) -> Self {
        if matches!(source.raw_os_error(), Some(libc::EMFILE | libc::ENFILE)) {
            Self::ResourceExhausted {
                source: Arc::new(source),
            }
        } else {
            Self::Create {
                source: Arc::new(source),
            }
        }
    }
}

/// Errors raised by [`CommandWriter::send`].
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The reader has gone away; nothing further can be delivered.
    #[error("worker closed its end of the command pipe")]
    BrokenPipe,
    /// Any other write failure.
    #[error("failed to write command to the worker: {source}")]
    Io {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl From<io::Error> for SendError {
    fn from(source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::BrokenPipe {
            Self::BrokenPipe
        } else {
            Self::Io {
                source: Arc::new(source),
            }
        }
    }
}

/// Allocates a connected (read end, write end) pair.
pub fn create() -> Result<(PipeReader, CommandWriter<PipeWriter>), PipeError> {
    let (reader, writer) = io::pipe()?;
    debug!(target: PIPE_TARGET, "command pipe created");
    Ok((reader, CommandWriter::new(writer)))
}

/// Sole writer of newline-delimited commands.
///
/// Dropping the writer, or calling [`CommandWriter::close_write`], closes
/// the write end and lets the reader observe end-of-stream.
#[derive(Debug)]
pub struct CommandWriter<W: Write> {
    inner: W,
    sent: usize,
}

impl<W: Write> CommandWriter<W> {
    /// Wraps an arbitrary sink; used directly by tests.
    #[must_use]
    pub const fn new(inner: W) -> Self {
        Self { inner, sent: 0 }
    }

    /// Number of commands written successfully.
    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }

    /// Writes `line` followed by a single newline.
    pub fn send(&mut self, line: &[u8]) -> Result<(), SendError> {
        self.inner.write_all(line)?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        self.sent += 1;
        Ok(())
    }

    /// Flushes and closes the write end.
    ///
    /// Failures are logged and otherwise ignored: the reader sees end of
    /// stream either way once the descriptor is dropped.
    pub fn close_write(mut self) {
        match self.inner.flush() {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => {}
            Err(error) => {
                warn!(
                    target: PIPE_TARGET,
                    error = %error,
                    "failed to flush command pipe before closing"
                );
            }
        }
        debug!(target: PIPE_TARGET, sent = self.sent, "command pipe write end closed");
    }
}
