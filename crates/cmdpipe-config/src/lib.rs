//! Shared configuration for the `cmdpipe` command streamer.
//!
//! [`Config`] is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`CMDPIPE_CONFIG_PATH`), then `CMDPIPE_*`
//! environment variables. The command line of the `cmdpipe` binary only
//! carries the command file path, so the binary hands the loader nothing but
//! its program name.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_CHUNK_CAPACITY, DEFAULT_LOG_FILTER, DEFAULT_THROTTLE_MS, DEFAULT_WORKER_BINARY,
    default_chunk_capacity, default_log_filter, default_log_filter_string, default_log_format,
    default_throttle, default_throttle_ms,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration shared by the streamer binary and its tests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CMDPIPE")]
pub struct Config {
    /// Tracing filter expression, for example `info` or `cmdpipe=debug`.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    log_filter: String,
    /// Log output format (`json` or `compact`).
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    log_format: LogFormat,
    /// Delay after each command written to the worker, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    #[ortho_config(default = default_throttle_ms())]
    throttle_ms: u64,
    /// Number of data bytes read from the command file per chunk.
    #[serde(default = "default_chunk_capacity")]
    #[ortho_config(default = default_chunk_capacity())]
    chunk_capacity: usize,
    /// Worker program; defaults to the bundled `cmdpipe-worker`.
    #[serde(default)]
    worker_program: Option<String>,
    /// Extra arguments passed to the worker program.
    #[serde(default)]
    worker_args: Vec<String>,
    /// Upper bound on the final wait for the worker, in milliseconds.
    #[serde(default)]
    wait_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            throttle_ms: default_throttle_ms(),
            chunk_capacity: default_chunk_capacity(),
            worker_program: None,
            worker_args: Vec::new(),
            wait_timeout_ms: None,
        }
    }
}

/// Semantic problems found in an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A zero-byte chunk would never make progress through the file.
    #[error("chunk_capacity must be at least one byte")]
    ZeroChunkCapacity,
    /// An empty worker program cannot be spawned.
    #[error("worker_program must not be empty")]
    EmptyWorkerProgram,
}

impl Config {
    /// Loads configuration from files and the environment only.
    ///
    /// `program` is used as the synthetic `argv[0]`; no other command-line
    /// arguments reach the loader.
    pub fn load_without_cli(program: impl Into<OsString>) -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter([program.into()])
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Delay inserted after every command sent to the worker.
    #[must_use]
    pub const fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Read chunk capacity in bytes.
    #[must_use]
    pub const fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// Explicit worker program, if configured.
    #[must_use]
    pub fn worker_program(&self) -> Option<&str> {
        self.worker_program.as_deref()
    }

    /// Arguments passed to the worker program.
    #[must_use]
    pub fn worker_args(&self) -> &[String] {
        &self.worker_args
    }

    /// Bound on the final wait, or `None` to block until the worker exits.
    #[must_use]
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// Replaces the log filter expression.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the log output format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Replaces the throttle interval; sub-millisecond precision is dropped.
    #[must_use]
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle_ms = millis(throttle);
        self
    }

    /// Replaces the read chunk capacity.
    #[must_use]
    pub const fn with_chunk_capacity(mut self, capacity: usize) -> Self {
        self.chunk_capacity = capacity;
        self
    }

    /// Sets the worker program and its arguments.
    #[must_use]
    pub fn with_worker<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_program = Some(program.into());
        self.worker_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets or clears the bound on the final wait.
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout_ms = timeout.map(millis);
        self
    }

    /// Rejects values that parse but cannot drive a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_capacity == 0 {
            return Err(ConfigError::ZeroChunkCapacity);
        }
        if self
            .worker_program
            .as_deref()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(ConfigError::EmptyWorkerProgram);
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
