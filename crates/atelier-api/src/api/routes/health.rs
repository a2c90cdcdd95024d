//! Health endpoints

use atelier_auth::CacheState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Signing key cache status
#[derive(Debug, Serialize)]
pub struct AuthHealthResponse {
    /// `fresh` or `stale_but_usable`
    pub state: &'static str,
    pub degraded: bool,
    pub generation: u64,
    pub key_ids: Vec<String>,
    pub age_secs: u64,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

/// Refreshes the key set first when a refresh is due. Returns 503 when the
/// key set is past its staleness ceiling and the gateway is configured to
/// reject tokens in that state.
pub async fn auth_health(State(state): State<AppState>) -> (StatusCode, Json<AuthHealthResponse>) {
    let cache = &state.key_cache;
    let key_set = cache.refresh_if_stale().await;
    let degraded = cache.is_degraded();

    let body = AuthHealthResponse {
        state: match cache.state() {
            CacheState::Fresh => "fresh",
            CacheState::StaleButUsable { .. } => "stale_but_usable",
        },
        degraded,
        generation: key_set.generation(),
        key_ids: key_set.key_ids().into_iter().map(str::to_string).collect(),
        age_secs: key_set.age().as_secs(),
        consecutive_failures: cache.consecutive_failures(),
        last_error: cache.last_error().map(|e| e.to_string()),
    };

    let status = if degraded && state.config.auth.reject_when_degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(body))
}
