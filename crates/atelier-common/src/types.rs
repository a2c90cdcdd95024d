//! Common types used across Atelier components

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for tenant identifier validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantIdError {
    #[error("Tenant ID cannot be empty")]
    Empty,
    #[error("Tenant ID too long (max 64 characters)")]
    TooLong,
    #[error("Tenant ID contains invalid characters. Only alphanumeric characters, hyphens, and underscores are allowed")]
    InvalidCharacters,
}

/// Identifier of a tenant (organization) on the marketplace
///
/// Tenant ids come from the identity provider's organization claim and from
/// business records. Comparison is exact; no case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a new validated tenant id
    pub fn new(id: impl Into<String>) -> Result<Self, TenantIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TenantIdError::Empty);
        }
        if id.len() > 64 {
            return Err(TenantIdError::TooLong);
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TenantIdError::InvalidCharacters);
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = TenantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error type for API key name validation
#[derive(Debug, Error)]
pub enum ApiKeyNameError {
    #[error("API key name cannot be empty")]
    Empty,
    #[error("API key name too long (max 100 characters)")]
    TooLong,
    #[error("API key name contains invalid characters. Only alphanumeric characters, hyphens, and underscores are allowed")]
    InvalidCharacters,
}

/// A validated API key name
///
/// API key names must:
/// - Be between 1 and 100 characters long
/// - Only contain alphanumeric characters (a-z, A-Z, 0-9), hyphens (-), and underscores (_)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiKeyName(String);

impl ApiKeyName {
    /// Create a new validated API key name
    pub fn new(name: impl Into<String>) -> Result<Self, ApiKeyNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ApiKeyNameError::Empty);
        }
        if name.len() > 100 {
            return Err(ApiKeyNameError::TooLong);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ApiKeyNameError::InvalidCharacters);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApiKeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ApiKeyName {
    type Error = ApiKeyNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApiKeyName> for String {
    fn from(name: ApiKeyName) -> Self {
        name.0
    }
}
