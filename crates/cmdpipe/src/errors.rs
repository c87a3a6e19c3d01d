//! Top-level failures of the streamer binary.

use std::sync::Arc;

use cmdpipe_config::ConfigError;
use thiserror::Error;

use crate::interrupt::InterruptError;
use crate::session::SessionError;
use crate::telemetry::TelemetryError;

/// Every failure that makes the streamer exit non-zero.
#[derive(Debug, Error)]
pub enum AppError {
    /// The arguments did not match the expected usage.
    #[error("{0}")]
    CliUsage(clap::Error),
    /// Configuration files or variables could not be loaded.
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    /// Configuration loaded but cannot drive a run.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// Logging could not be set up.
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    /// The worker error handler could not be installed.
    #[error(transparent)]
    Interrupt(#[from] InterruptError),
    /// The streaming session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
