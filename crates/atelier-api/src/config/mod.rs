//! Configuration module for the Atelier API gateway

mod auth;
mod server;

pub use auth::AuthConfig;
pub use server::ServerConfig;

use atelier_common::config::ConfigLoader;
use atelier_common::ConfigurationError as ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "ATELIER_API_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "atelier-api.toml";

/// Main configuration structure for the Atelier API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Identity provider and policy configuration
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = <Config as ConfigLoader<Config>>::load(config_path)?;
        config.auth.validate()?;
        Ok(config)
    }

    /// Generate example configuration file
    pub fn generate_example() -> Result<String, ConfigError> {
        let config = Self::default();
        toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError {
            details: format!("Failed to serialize config: {e}"),
        })
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout)
    }

    fn figment(file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}

impl ConfigLoader<Config> for Config {
    fn load(path: Option<PathBuf>) -> Result<Config, ConfigError> {
        let figment = match path {
            Some(p) => Self::figment(p),
            None => Self::figment(DEFAULT_CONFIG_FILE),
        };

        figment.extract().map_err(|e| ConfigError::ParseError {
            details: e.to_string(),
        })
    }

    fn load_from_file(path: &Path) -> Result<Config, ConfigError> {
        Self::figment(path)
            .extract()
            .map_err(|e| ConfigError::ParseError {
                details: e.to_string(),
            })
    }
}
