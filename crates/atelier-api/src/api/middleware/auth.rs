//! Bearer token authentication middleware
//!
//! Validates the token, resolves the caller identity and provisions a local
//! account for humans. The resulting [`AuthContext`] is stored in the request
//! extensions for handlers.

use atelier_auth::Identity;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{error::ApiError, server::AppState};

/// Authenticated caller attached to the request
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub identity: Identity,

    /// Local account id; services have none
    pub user_id: Option<String>,

    pub email: Option<String>,
}

impl AuthContext {
    pub fn is_service(&self) -> bool {
        self.identity.is_service()
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = state.validator.authenticate(req.headers()).map_err(|e| {
        debug!(error = %e, path = %req.uri().path(), "Rejected bearer token");
        e
    })?;

    let identity = Identity::resolve(&claims, &state.registry)?;

    let user_id = if identity.is_service() {
        None
    } else {
        let account = state
            .provisioner
            .ensure_account(&identity, claims.email.as_deref())
            .await
            .map_err(|e| {
                warn!(
                    subject = %identity.principal_id(),
                    "Failed to provision local account: {}", e
                );
                e
            })?;
        Some(account)
    };

    debug!(
        principal = %identity.principal_id(),
        service = identity.is_service(),
        "Authenticated request"
    );

    req.extensions_mut().insert(AuthContext {
        identity,
        user_id,
        email: claims.email,
    });

    Ok(next.run(req).await)
}
