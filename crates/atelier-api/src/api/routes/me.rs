//! Current caller

use atelier_auth::Identity;
use axum::{extract::State, Json};
use serde::Serialize;

use crate::{api::extractors::Authenticated, error::Result, server::AppState};

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub principal_id: String,
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub async fn get_me(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
) -> Result<Json<MeResponse>> {
    auth.identity
        .require_scopes(state.config.auth.scopes_for("me"))?;

    Ok(Json(MeResponse {
        principal_id: auth.identity.principal_id().to_string(),
        identity: auth.identity,
        account_id: auth.user_id,
        email: auth.email,
    }))
}
