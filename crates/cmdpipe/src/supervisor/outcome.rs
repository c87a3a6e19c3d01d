use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// How a worker process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The worker exited normally with the given code.
    ExitedWithCode(i32),
    /// The worker was terminated by the given signal.
    KilledBySignal(i32),
    /// Neither a normal exit nor a signal termination was reported.
    Unknown,
}

impl ExitOutcome {
    /// Decodes a raw wait status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            Self::ExitedWithCode(code)
        } else if let Some(signal) = status.signal() {
            Self::KilledBySignal(signal)
        } else {
            Self::Unknown
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        Self::from_status(status)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExitedWithCode(code) => write!(f, "exited with code {code}"),
            Self::KilledBySignal(signal) => write!(f, "killed by signal {signal}"),
            Self::Unknown => f.write_str("ended with unknown status"),
        }
    }
}
