//! Metric names and recording helpers
//!
//! Recording is a no-op until the host process installs a recorder.

use std::time::Duration;

pub const JWKS_REFRESH_TOTAL: &str = "atelier_auth_jwks_refresh_total";
pub const JWKS_AGE_SECONDS: &str = "atelier_auth_jwks_age_seconds";
pub const JWKS_KEYS: &str = "atelier_auth_jwks_keys";
pub const JWKS_CONSECUTIVE_FAILURES: &str = "atelier_auth_jwks_consecutive_failures";
pub const TOKEN_VALIDATIONS_TOTAL: &str = "atelier_auth_token_validations_total";
pub const DEGRADED_VALIDATIONS_TOTAL: &str = "atelier_auth_degraded_validations_total";

pub(crate) fn record_refresh_success(key_count: usize) {
    metrics::counter!(JWKS_REFRESH_TOTAL, "outcome" => "success").increment(1);
    metrics::gauge!(JWKS_KEYS).set(key_count as f64);
    metrics::gauge!(JWKS_AGE_SECONDS).set(0.0);
    metrics::gauge!(JWKS_CONSECUTIVE_FAILURES).set(0.0);
}

pub(crate) fn record_refresh_failure(consecutive_failures: u32) {
    metrics::counter!(JWKS_REFRESH_TOTAL, "outcome" => "failure").increment(1);
    metrics::gauge!(JWKS_CONSECUTIVE_FAILURES).set(f64::from(consecutive_failures));
}

pub(crate) fn record_key_set_age(age: Duration) {
    metrics::gauge!(JWKS_AGE_SECONDS).set(age.as_secs_f64());
}

pub(crate) fn record_validation(outcome: &'static str) {
    metrics::counter!(TOKEN_VALIDATIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_degraded_validation() {
    metrics::counter!(DEGRADED_VALIDATIONS_TOTAL).increment(1);
}
