//! The control loop that streams framed commands into the worker pipe.
//!
//! The pump moves through `Reading → Streaming → (Interrupted | Exhausted)
//! → Draining → Done`. The interrupt flag is polled before every send and
//! after every chunk read, so a worker error is honoured within one throttle
//! interval plus one write. The write end is closed exactly once, on the way
//! into `Done`, whatever the reason streaming stopped.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::framer::{CommandRecord, FramerError, LineFramer};
use crate::interrupt::InterruptFlag;
use crate::pipe::{CommandWriter, SendError};
use crate::progress::ProgressReporter;

const PUMP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pump");

/// Why streaming stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every command in the source was sent.
    Exhausted,
    /// The worker raised its error signal.
    Interrupted,
    /// The worker closed its end of the pipe.
    PeerClosed,
}

/// Tally of a completed pump run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSummary {
    /// Commands written to the pipe.
    pub sent: usize,
    /// Source lines terminated when streaming stopped, blank lines included.
    pub lines_seen: usize,
    /// Reason streaming stopped.
    pub stop: StopReason,
}

/// Failures that end streaming early.
///
/// The write end has already been closed when one of these is returned.
#[derive(Debug, Clone, Error)]
pub enum PumpError {
    /// Reading the command source failed.
    #[error(transparent)]
    Source(#[from] FramerError),
    /// Writing a command failed for a reason other than a closed pipe.
    #[error("failed to send command on line {line_number}: {source}")]
    Send {
        /// Line of the command that could not be written.
        line_number: usize,
        /// Underlying write error.
        #[source]
        source: SendError,
    },
}

enum PumpState {
    Reading,
    Streaming(std::vec::IntoIter<CommandRecord>),
    Draining(Result<StopReason, PumpError>),
}

/// Streams records from a framer into a command writer.
pub struct CommandPump<'a> {
    interrupt: &'a InterruptFlag,
    reporter: &'a dyn ProgressReporter,
    throttle: Duration,
}

impl<'a> CommandPump<'a> {
    /// Creates a pump polling `interrupt` and reporting to `reporter`.
    #[must_use]
    pub fn new(interrupt: &'a InterruptFlag, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            interrupt,
            reporter,
            throttle: Duration::ZERO,
        }
    }

    /// Sets the pause after each command; zero disables throttling.
    #[must_use]
    pub const fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Runs the loop to completion, consuming and closing `writer`.
    pub fn run<R, W>(
        &self,
        framer: &mut LineFramer<R>,
        writer: CommandWriter<W>,
    ) -> Result<PumpSummary, PumpError>
    where
        R: Read,
        W: Write,
    {
        let mut writer = writer;
        let mut state = PumpState::Reading;
        let result = loop {
            state = match state {
                PumpState::Reading => self.read(framer),
                PumpState::Streaming(records) => self.stream(records, &mut writer),
                PumpState::Draining(result) => break result,
            };
        };

        debug!(target: PUMP_TARGET, "draining: closing write end");
        let sent = writer.sent();
        writer.close_write();

        let stop = result?;
        let summary = PumpSummary {
            sent,
            lines_seen: framer.line_number(),
            stop,
        };
        info!(
            target: PUMP_TARGET,
            sent = summary.sent,
            lines = summary.lines_seen,
            stop = ?summary.stop,
            "streaming finished"
        );
        Ok(summary)
    }

    fn read<R: Read>(&self, framer: &mut LineFramer<R>) -> PumpState {
        if self.interrupt.is_raised() {
            return self.stop_interrupted();
        }
        match framer.next_batch() {
            Ok(Some(batch)) => PumpState::Streaming(batch.into_iter()),
            Ok(None) => {
                debug!(target: PUMP_TARGET, "source exhausted");
                PumpState::Draining(Ok(StopReason::Exhausted))
            }
            Err(error) => {
                warn!(target: PUMP_TARGET, error = %error, "command source failed");
                PumpState::Draining(Err(error.into()))
            }
        }
    }

    fn stream<W: Write>(
        &self,
        mut records: std::vec::IntoIter<CommandRecord>,
        writer: &mut CommandWriter<W>,
    ) -> PumpState {
        let Some(record) = records.next() else {
            return PumpState::Reading;
        };
        if self.interrupt.is_raised() {
            return self.stop_interrupted();
        }

        self.reporter.command_sending(&record);
        match writer.send(record.as_bytes()) {
            Ok(()) => {}
            Err(SendError::BrokenPipe) => {
                warn!(
                    target: PUMP_TARGET,
                    line = record.line_number(),
                    "worker closed the pipe"
                );
                self.reporter.peer_closed();
                return PumpState::Draining(Ok(StopReason::PeerClosed));
            }
            Err(source) => {
                return PumpState::Draining(Err(PumpError::Send {
                    line_number: record.line_number(),
                    source,
                }));
            }
        }
        debug!(
            target: PUMP_TARGET,
            line = record.line_number(),
            bytes = record.as_bytes().len(),
            "command sent"
        );

        if !self.throttle.is_zero() {
            thread::sleep(self.throttle);
        }
        PumpState::Streaming(records)
    }

    fn stop_interrupted(&self) -> PumpState {
        info!(target: PUMP_TARGET, "worker error signalled, stopping");
        self.reporter.interrupted();
        PumpState::Draining(Ok(StopReason::Interrupted))
    }
}
