use std::time::Duration;

use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Delay inserted after every command written to the worker.
pub const DEFAULT_THROTTLE_MS: u64 = 1000;

/// Number of data bytes pulled from the command file per read.
pub const DEFAULT_CHUNK_CAPACITY: usize = 1023;

/// Name of the reference worker binary shipped with the workspace.
pub const DEFAULT_WORKER_BINARY: &str = "cmdpipe-worker";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default throttle interval in milliseconds.
#[must_use]
pub const fn default_throttle_ms() -> u64 {
    DEFAULT_THROTTLE_MS
}

/// Default throttle interval.
#[must_use]
pub const fn default_throttle() -> Duration {
    Duration::from_millis(DEFAULT_THROTTLE_MS)
}

/// Default read chunk capacity in bytes.
#[must_use]
pub const fn default_chunk_capacity() -> usize {
    DEFAULT_CHUNK_CAPACITY
}
