//! Out-of-band abort channel from the worker to the streamer.
//!
//! The worker raises [`INTERRUPT_SIGNAL`] against the streamer's PID when a
//! command fails irrecoverably. The installed handler latches an
//! [`InterruptFlag`], writes [`INTERRUPT_NOTICE`] to stdout with a single
//! `write(2)` and returns. The flag is the only state shared with the handler.

use std::io;
use std::os::fd::BorrowedFd;
use std::os::raw::c_int;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::libc;
use signal_hook::SigId;
use signal_hook::consts::signal::SIGUSR1;
use thiserror::Error;
use tracing::debug;

const INTERRUPT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::interrupt");

/// Signal the worker sends to report a fatal command failure.
pub const INTERRUPT_SIGNAL: c_int = SIGUSR1;

/// Notice written by the handler when the signal arrives.
pub const INTERRUPT_NOTICE: &[u8] = b"Parent: received worker error signal\n";

/// One-shot abort latch shared between the handler and the pump.
///
/// Clones observe the same latch. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Creates a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Reports whether the flag has been latched.
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Errors raised while installing the handler.
#[derive(Debug, Error)]
pub enum InterruptError {
    /// The signal disposition could not be changed.
    #[error("failed to install the worker error signal handler: {source}")]
    Install {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// Keeps the handler registered; unregisters it on drop.
#[derive(Debug)]
pub struct InterruptGuard {
    id: SigId,
    flag: InterruptFlag,
}

impl InterruptGuard {
    /// The flag this handler latches.
    #[must_use]
    pub const fn flag(&self) -> &InterruptFlag {
        &self.flag
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let removed = signal_hook::low_level::unregister(self.id);
        debug!(target: INTERRUPT_TARGET, removed, "worker error handler removed");
    }
}

/// Installs the handler that latches `flag` on [`INTERRUPT_SIGNAL`].
///
/// Must run before the worker is spawned: the default disposition of
/// `SIGUSR1` terminates the process.
pub fn install(flag: &InterruptFlag) -> Result<InterruptGuard, InterruptError> {
    let latch = Arc::clone(&flag.raised);
    let action = move || {
        latch.store(true, Ordering::Release);
        write_notice();
    };
    // SAFETY: the action only performs an atomic store and a raw write(2),
    // both async-signal-safe; it neither allocates nor takes locks.
    let id = unsafe { signal_hook::low_level::register(INTERRUPT_SIGNAL, action) }
        .map_err(|source| InterruptError::Install { source })?;
    debug!(
        target: INTERRUPT_TARGET,
        signal = INTERRUPT_SIGNAL,
        "worker error handler installed"
    );
    Ok(InterruptGuard {
        id,
        flag: flag.clone(),
    })
}

fn write_notice() {
    // SAFETY: stdout stays open for the lifetime of the process.
    let stdout = unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
    nix::unistd::write(stdout, INTERRUPT_NOTICE).ok();
}
