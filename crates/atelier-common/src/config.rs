//! Configuration loading contract
//!
//! Every service configuration is layered the same way: compiled-in defaults,
//! then an optional TOML file, then prefixed environment variables using `__`
//! as the nesting separator.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    #[error("Missing required configuration value: {key}")]
    MissingValue { key: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl crate::AtelierError for ConfigurationError {}

/// Loader implemented by each service configuration type
pub trait ConfigLoader<T> {
    /// Load from the given path, or the service's default file name when `None`
    fn load(path: Option<PathBuf>) -> Result<T, ConfigurationError>;

    /// Load from an explicit file path
    fn load_from_file(path: &Path) -> Result<T, ConfigurationError>;
}
