//! Error types for the Atelier API gateway

use atelier_auth::{AuthError, AuthOutcome};
use atelier_common::AtelierError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::provisioning::ProvisioningError;

/// Main error type for the Atelier API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] atelier_common::ConfigurationError),

    /// Authentication or authorization failure
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Local account could not be provisioned
    #[error("Account provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    /// Bad request with message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Internal server error
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

impl AtelierError for ApiError {}

impl ApiError {
    /// Get error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Config(_) => "ATELIER_API_CONFIG_ERROR",
            ApiError::Auth(e) => e.error_code(),
            ApiError::Provisioning(_) => "ATELIER_API_PROVISIONING_ERROR",
            ApiError::BadRequest { .. } => "ATELIER_API_BAD_REQUEST",
            ApiError::Internal { .. } => "ATELIER_API_INTERNAL_ERROR",
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Auth(e) => e.outcome() == AuthOutcome::Unavailable,
            ApiError::Provisioning(e) => e.is_transient(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(e) => match e.outcome() {
                AuthOutcome::Unauthenticated => StatusCode::UNAUTHORIZED,
                AuthOutcome::Unauthorized => StatusCode::FORBIDDEN,
                AuthOutcome::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Provisioning(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Provisioning(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Config(_) | ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now(),
                "retryable": self.is_retryable(),
            }
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_outcomes_map_to_status() {
        assert_eq!(
            ApiError::from(AuthError::ExpiredToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::TenantMismatch).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(AuthError::KeySetStale { age_secs: 1 }).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::from(AuthError::InsufficientPrivilege).error_code(),
            "AUTHZ_INSUFFICIENT_PRIVILEGE"
        );
        assert_eq!(
            ApiError::BadRequest {
                message: "x".to_string()
            }
            .error_code(),
            "ATELIER_API_BAD_REQUEST"
        );
    }

    #[test]
    fn test_unauthorized_response_carries_challenge() {
        let response = ApiError::from(AuthError::MissingCredential).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let response = ApiError::from(AuthError::TenantMismatch).into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_retryable() {
        assert!(ApiError::from(AuthError::KeySetUnavailable {
            reason: "down".to_string()
        })
        .is_retryable());
        assert!(!ApiError::from(AuthError::InvalidSignature).is_retryable());
    }
}
