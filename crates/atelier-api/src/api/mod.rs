//! API module for the Atelier API gateway

pub mod extractors;
pub mod middleware;
pub mod routes;

use crate::server::AppState;
use axum::{routing::get, Router};

/// Authenticated API routes
pub fn routes(state: AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/me", get(routes::me::get_me))
        .route(
            "/tenants/:tenant_id/access-check",
            get(routes::access_check::check_access),
        );

    middleware::apply_auth(router, state)
}

/// Unauthenticated liveness and key set status
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/auth", get(routes::health::auth_health))
}
