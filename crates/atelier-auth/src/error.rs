//! Error taxonomy for authentication and authorization

use std::time::Duration;
use thiserror::Error;

/// How an [`AuthError`] should be surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The credential could not be trusted (HTTP 401)
    Unauthenticated,
    /// The caller is known but may not perform the operation (HTTP 403)
    Unauthorized,
    /// Verification material is not available (HTTP 503)
    Unavailable,
}

/// Authentication and authorization failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Malformed credential: {reason}")]
    MalformedCredential { reason: String },

    #[error("Token signature could not be verified")]
    InvalidSignature,

    #[error("Token is expired or not yet valid")]
    ExpiredToken,

    #[error("Token issuer '{actual}' is not trusted")]
    IssuerMismatch { actual: String },

    #[error("Token audience is not accepted by this service")]
    AudienceMismatch,

    #[error("Missing required scopes: {}", missing.join(" "))]
    InsufficientScope { missing: Vec<String> },

    #[error("Insufficient privilege for this resource")]
    InsufficientPrivilege,

    #[error("Resource belongs to a different tenant")]
    TenantMismatch,

    #[error("Signing key set unavailable: {reason}")]
    KeySetUnavailable { reason: String },

    #[error("Signing key set is stale ({age_secs}s since last successful refresh)")]
    KeySetStale { age_secs: u64 },
}

impl AuthError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCredential {
            reason: reason.into(),
        }
    }

    /// Classify the error for the transport layer
    pub fn outcome(&self) -> AuthOutcome {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedCredential { .. }
            | AuthError::InvalidSignature
            | AuthError::ExpiredToken
            | AuthError::IssuerMismatch { .. }
            | AuthError::AudienceMismatch => AuthOutcome::Unauthenticated,
            AuthError::InsufficientScope { .. }
            | AuthError::InsufficientPrivilege
            | AuthError::TenantMismatch => AuthOutcome::Unauthorized,
            AuthError::KeySetUnavailable { .. } | AuthError::KeySetStale { .. } => {
                AuthOutcome::Unavailable
            }
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "AUTH_MISSING_CREDENTIAL",
            AuthError::MalformedCredential { .. } => "AUTH_MALFORMED_CREDENTIAL",
            AuthError::InvalidSignature => "AUTH_INVALID_SIGNATURE",
            AuthError::ExpiredToken => "AUTH_EXPIRED_TOKEN",
            AuthError::IssuerMismatch { .. } => "AUTH_ISSUER_MISMATCH",
            AuthError::AudienceMismatch => "AUTH_AUDIENCE_MISMATCH",
            AuthError::InsufficientScope { .. } => "AUTHZ_INSUFFICIENT_SCOPE",
            AuthError::InsufficientPrivilege => "AUTHZ_INSUFFICIENT_PRIVILEGE",
            AuthError::TenantMismatch => "AUTHZ_TENANT_MISMATCH",
            AuthError::KeySetUnavailable { .. } => "AUTH_KEY_SET_UNAVAILABLE",
            AuthError::KeySetStale { .. } => "AUTH_KEY_SET_STALE",
        }
    }
}

impl atelier_common::AtelierError for AuthError {}

/// Failure to fetch or parse the identity provider's key set
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeySetFetchError {
    #[error("JWKS request failed: {0}")]
    Request(String),

    #[error("JWKS endpoint returned status {0}")]
    Status(u16),

    #[error("Failed to parse JWKS document: {0}")]
    Decode(String),

    #[error("JWKS document contains no usable signing keys")]
    NoUsableKeys,

    #[error("JWKS fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl atelier_common::AtelierError for KeySetFetchError {}

pub type Result<T> = std::result::Result<T, AuthError>;
