//! # Atelier API
//!
//! HTTP gateway in front of the Atelier marketplace services. Every request
//! under `/api/v1` carries an identity provider bearer token that is
//! validated against a cached JWKS, resolved into a human or service
//! identity and checked against the tenant access policy.

pub mod api;
pub mod config;
pub mod error;
pub mod provisioning;
pub mod server;

pub use error::{ApiError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// API version prefix
pub const API_VERSION: &str = "v1";
