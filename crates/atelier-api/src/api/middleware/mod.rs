//! API middleware stack

mod auth;

pub use auth::{auth_middleware, AuthContext};

use crate::server::AppState;
use axum::Router;

/// Require a valid bearer token on every route of `router`
pub fn apply_auth(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(axum::middleware::from_fn_with_state(state, auth_middleware))
}
