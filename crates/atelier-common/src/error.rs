//! Error conventions shared across Atelier crates

/// Marker trait implemented by the top-level error type of each crate.
///
/// It pins the bounds every service error must satisfy so errors can cross
/// task and thread boundaries and be boxed into `anyhow::Error` at the edges.
pub trait AtelierError: std::error::Error + Send + Sync + 'static {}
