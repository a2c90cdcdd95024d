//! Typed view of a verified token's claims

use atelier_common::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::error::{AuthError, Result};
use crate::scopes::parse_scope_claim;

pub const DEFAULT_TENANT_CLAIM: &str = "org_id";
pub const DEFAULT_ROLE_CLAIM: &str = "https://atelier.app/role";

/// `gty` value the identity provider sets on client-credential grants
const CLIENT_CREDENTIALS_GRANT: &str = "client-credentials";
/// Subject suffix used for machine clients
const MACHINE_SUBJECT_SUFFIX: &str = "@clients";

/// A claim that may be a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Claims exactly as they appear in the token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<OneOrMany>,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub gty: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Namespaced and provider-specific claims
    #[serde(flatten)]
    pub custom: HashMap<String, Value>,
}

/// Names of the non-standard claims carrying tenant and role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimNames {
    pub tenant_claim: String,
    pub role_claim: String,
}

impl Default for ClaimNames {
    fn default() -> Self {
        Self {
            tenant_claim: DEFAULT_TENANT_CLAIM.to_string(),
            role_claim: DEFAULT_ROLE_CLAIM.to_string(),
        }
    }
}

/// Claims of a token whose signature and registered claims were verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: Option<String>,
    pub client_id: Option<String>,
    pub tenant_id: Option<TenantId>,
    pub scopes: BTreeSet<String>,
    pub audiences: Vec<String>,
    pub issuer: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    /// Role names in the order the token lists them
    pub roles: Vec<String>,
    pub email: Option<String>,
    grant_type: Option<String>,
}

impl Claims {
    /// Build the typed bundle. Absent claims become empty values; a tenant
    /// claim that is present but not a valid tenant id is rejected.
    pub fn from_verified(raw: RawClaims, names: &ClaimNames) -> Result<Self> {
        let mut scopes = raw
            .scope
            .as_deref()
            .map(parse_scope_claim)
            .unwrap_or_default();
        if let Some(permissions) = raw.permissions {
            scopes.extend(permissions);
        }

        let tenant_id = match raw.custom.get(&names.tenant_claim) {
            None | Some(Value::Null) => None,
            Some(Value::String(value)) if value.is_empty() => None,
            Some(Value::String(value)) => Some(value.parse::<TenantId>().map_err(|e| {
                AuthError::malformed(format!("invalid {} claim: {}", names.tenant_claim, e))
            })?),
            Some(other) => {
                return Err(AuthError::malformed(format!(
                    "{} claim must be a string, got {}",
                    names.tenant_claim, other
                )))
            }
        };

        let roles = match raw.custom.get(&names.role_claim) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(role)) => vec![role.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                warn!(claim = %names.role_claim, "Ignoring role claim of unexpected type: {}", other);
                Vec::new()
            }
        };

        let expires_at = DateTime::from_timestamp(raw.exp, 0)
            .ok_or_else(|| AuthError::malformed("exp claim out of range"))?;
        let issued_at = raw.iat.and_then(|iat| DateTime::from_timestamp(iat, 0));

        Ok(Self {
            subject: raw.sub.filter(|s| !s.is_empty()),
            client_id: raw.client_id.or(raw.azp),
            tenant_id,
            scopes,
            audiences: raw.aud.map(OneOrMany::into_vec).unwrap_or_default(),
            issuer: raw.iss,
            expires_at,
            issued_at,
            roles,
            email: raw.email,
            grant_type: raw.gty,
        })
    }

    /// Whether the token was issued to a machine client rather than a person
    pub fn is_machine(&self) -> bool {
        if self.grant_type.as_deref() == Some(CLIENT_CREDENTIALS_GRANT) {
            return true;
        }
        match &self.subject {
            None => true,
            Some(subject) => subject.ends_with(MACHINE_SUBJECT_SUFFIX),
        }
    }

    pub fn has_audience(&self, audience: &str) -> bool {
        self.audiences.iter().any(|aud| aud == audience)
    }

    /// Exact membership; no prefix or hierarchy matching
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required.iter().all(|scope| self.has_scope(scope))
    }

    pub fn require_scopes(&self, required: &[&str]) -> Result<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|scope| !self.has_scope(scope))
            .map(|scope| scope.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope { missing })
        }
    }
}
