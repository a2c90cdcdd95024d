//! Identity provider and access policy configuration

use atelier_auth::{CacheSettings, ClaimNames, ValidationSettings};
use atelier_common::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected `iss` claim, compared exactly (including trailing slash)
    pub issuer: String,

    /// JWKS location; derived from the issuer when unset
    pub jwks_url: Option<String>,

    /// Token endpoint machine clients use for client credentials
    pub token_endpoint: Option<String>,

    /// Audiences this API accepts
    pub audiences: Vec<String>,

    pub validate_issuer: bool,

    pub validate_audience: bool,

    /// Allowed clock skew in seconds
    pub clock_skew_secs: u64,

    /// Key set time-to-live in seconds
    pub jwks_cache_ttl_secs: u64,

    /// Proactive refresh lead time before the TTL, in seconds
    pub refresh_window_secs: u64,

    /// Background refresh tick in seconds
    pub refresh_check_interval_secs: u64,

    /// JWKS fetch timeout in seconds
    pub fetch_timeout_secs: u64,

    /// Age in seconds after which the key set counts as degraded
    pub max_staleness_secs: Option<u64>,

    /// Reject tokens instead of warning once the key set is degraded
    pub reject_when_degraded: bool,

    /// Claim carrying the tenant (organization) id
    pub tenant_claim: String,

    /// Claim carrying the role name
    pub role_claim: String,

    /// Hold service tokens that name a tenant to that tenant
    pub service_tenant_binding: bool,

    /// Operation name to scopes required before the handler runs
    pub route_scopes: BTreeMap<String, Vec<String>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let names = ClaimNames::default();
        Self {
            issuer: "https://id.atelier.app/".to_string(),
            jwks_url: None,
            token_endpoint: None,
            audiences: vec!["https://api.atelier.app".to_string()],
            validate_issuer: true,
            validate_audience: true,
            clock_skew_secs: 60,
            jwks_cache_ttl_secs: 3600,
            refresh_window_secs: 300,
            refresh_check_interval_secs: 60,
            fetch_timeout_secs: 10,
            max_staleness_secs: Some(24 * 3600),
            reject_when_degraded: false,
            tenant_claim: names.tenant_claim,
            role_claim: names.role_claim,
            service_tenant_binding: false,
            route_scopes: BTreeMap::new(),
        }
    }
}

impl AuthConfig {
    /// Resolve the JWKS endpoint
    pub fn jwks_url(&self) -> Result<Url, ConfigurationError> {
        let raw = match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!(
                "{}/.well-known/jwks.json",
                self.issuer.trim_end_matches('/')
            ),
        };
        Url::parse(&raw).map_err(|e| ConfigurationError::InvalidValue {
            key: "auth.jwks_url".to_string(),
            reason: e.to_string(),
        })
    }

    /// Check values that figment cannot
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.validate_issuer && self.issuer.is_empty() {
            return Err(ConfigurationError::MissingValue {
                key: "auth.issuer".to_string(),
            });
        }
        if self.validate_audience && self.audiences.is_empty() {
            return Err(ConfigurationError::MissingValue {
                key: "auth.audiences".to_string(),
            });
        }
        if self.refresh_window_secs >= self.jwks_cache_ttl_secs {
            return Err(ConfigurationError::InvalidValue {
                key: "auth.refresh_window_secs".to_string(),
                reason: "must be shorter than jwks_cache_ttl_secs".to_string(),
            });
        }
        if self.refresh_check_interval_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                key: "auth.refresh_check_interval_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let Some(endpoint) = &self.token_endpoint {
            Url::parse(endpoint).map_err(|e| ConfigurationError::InvalidValue {
                key: "auth.token_endpoint".to_string(),
                reason: e.to_string(),
            })?;
        }
        self.jwks_url()?;
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.jwks_cache_ttl_secs),
            refresh_window: Duration::from_secs(self.refresh_window_secs),
            check_interval: Duration::from_secs(self.refresh_check_interval_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_staleness: self.max_staleness_secs.map(Duration::from_secs),
        }
    }

    pub fn validation_settings(&self) -> ValidationSettings {
        let mut settings = ValidationSettings::new(self.issuer.clone(), self.audiences.clone());
        settings.validate_issuer = self.validate_issuer;
        settings.validate_audience = self.validate_audience;
        settings.clock_skew = Duration::from_secs(self.clock_skew_secs);
        settings.reject_when_degraded = self.reject_when_degraded;
        settings.claim_names = ClaimNames {
            tenant_claim: self.tenant_claim.clone(),
            role_claim: self.role_claim.clone(),
        };
        settings
    }

    /// Scopes configured for an operation; empty when none are configured
    pub fn scopes_for(&self, operation: &str) -> &[String] {
        self.route_scopes
            .get(operation)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
