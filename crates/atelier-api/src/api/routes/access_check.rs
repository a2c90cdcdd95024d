//! Tenant access decision endpoint
//!
//! Lets a caller ask whether it may act inside a tenant, optionally on a
//! resource owned by a given subject, holding a set of scopes.

use atelier_auth::{scopes::parse_scope_claim, AccessContext, AllowReason};
use atelier_common::TenantId;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::extractors::Authenticated,
    error::{ApiError, Result},
    server::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct AccessCheckQuery {
    /// Space separated scopes the operation needs
    pub scopes: Option<String>,
    /// Subject owning the resource
    pub owner: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessCheckResponse {
    pub allowed: bool,
    pub reason: AllowReason,
    pub tenant_id: TenantId,
}

pub async fn check_access(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<AccessCheckQuery>,
    Authenticated(auth): Authenticated,
) -> Result<Json<AccessCheckResponse>> {
    let tenant_id = TenantId::new(tenant_id).map_err(|e| ApiError::BadRequest {
        message: format!("Invalid tenant id: {e}"),
    })?;

    let mut required = parse_scope_claim(query.scopes.as_deref().unwrap_or_default());
    required.extend(state.config.auth.scopes_for("access_check").iter().cloned());

    let mut ctx = AccessContext::new().in_tenant(tenant_id.clone());
    for scope in required {
        ctx = ctx.require(scope);
    }
    if let Some(owner) = query.owner {
        ctx = ctx.owned_by(owner);
    }

    let reason = state.policy.check(&auth.identity, &ctx)?;

    Ok(Json(AccessCheckResponse {
        allowed: true,
        reason,
        tenant_id,
    }))
}
