//! Configuration loading seam.

use std::sync::Arc;

use cmdpipe_config::Config;
use ortho_config::OrthoError;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader {
    /// Loads the streamer configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader reading configuration files and `CMDPIPE_*` variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_without_cli(env!("CARGO_PKG_NAME"))
    }
}

/// Loader returning a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}
