//! Request extractors

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{api::middleware::AuthContext, error::ApiError};
use atelier_auth::AuthError;

/// The caller established by the auth middleware
///
/// Rejects with 401 on routes the middleware does not cover.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Authenticated)
            .ok_or(ApiError::Auth(AuthError::MissingCredential))
    }
}
