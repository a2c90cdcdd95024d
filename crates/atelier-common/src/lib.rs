//! # Atelier Common
//!
//! Shared building blocks for the Atelier marketplace services: validated
//! identifier types, the configuration loading contract, and the unified
//! logging initialization used by every binary.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{ConfigLoader, ConfigurationError};
pub use error::AtelierError;
pub use types::{ApiKeyName, ApiKeyNameError, TenantId, TenantIdError};
