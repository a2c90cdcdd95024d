//! # Atelier Auth
//!
//! Request authentication and authorization for the Atelier marketplace.
//!
//! ## Features
//!
//! - **Key set cache**: JWKS fetched at startup, refreshed in the background,
//!   served stale when the identity provider is unreachable
//! - **Token validation**: Bearer extraction, signature, issuer, audience and
//!   expiry checks with clock skew
//! - **Identity**: typed human and service principals resolved from claims
//! - **Role registry**: static role to scope table for platform, tenant,
//!   overlay and service roles
//! - **Access policy**: ownership, platform-admin and tenant-match rules
//! - **API keys**: resource-scoped keys with wildcard grants

pub mod api_keys;
pub mod cache;
pub mod claims;
pub mod error;
pub mod identity;
pub mod key_set;
pub mod metrics;
pub mod policy;
pub mod roles;
pub mod scopes;
pub mod source;
pub mod validator;

// Re-export commonly used types
pub use cache::{spawn_refresh_task, CacheSettings, CacheState, KeySetCache};
pub use claims::{ClaimNames, Claims, RawClaims};
pub use error::{AuthError, AuthOutcome, KeySetFetchError, Result};
pub use identity::Identity;
pub use key_set::{JwksDocument, KeySet};
pub use policy::{AccessContext, AccessPolicy, AllowReason};
pub use roles::{Role, RoleDefinition, RoleKind, RoleScopeRegistry};
pub use source::{HttpKeySetSource, KeySetSource};
pub use validator::{extract_bearer_token, TokenValidator, ValidationSettings, VerifiedToken};
