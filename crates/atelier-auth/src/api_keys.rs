//! Resource-scoped API keys
//!
//! Keys are shown once as `atk_<kid>_<secret>`. Only an Argon2id hash of the
//! secret is stored. Unlike bearer tokens, a key grant may contain the `*`
//! wildcard, which covers every scope of the key's resource.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use atelier_common::ApiKeyName;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::scopes::{self, resource_key_allows, WILDCARD};

const TOKEN_PREFIX: &str = "atk";
const KID_HEX_LEN: usize = 16;

/// Stored API key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub kid: String,
    pub name: ApiKeyName,
    /// Subject the key acts on behalf of
    pub owner: String,
    /// Resource the key is restricted to
    pub resource: String,
    pub hash: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct GeneratedApiKey {
    pub kid: String,
    pub secret: String,
    pub display_token: String,
    pub hash: String,
}

/// A key that passed verification for a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedApiKey {
    pub kid: String,
    pub owner: String,
    pub resource: String,
    pub scopes: Vec<String>,
}

impl VerifiedApiKey {
    pub fn allows(&self, scope: &str) -> bool {
        resource_key_allows(&self.scopes, scope)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error("Invalid token format")]
    InvalidFormat,

    #[error("API key not found")]
    NotFound,

    #[error("API key has been revoked")]
    Revoked,

    #[error("Invalid API key secret")]
    InvalidSecret,

    #[error("API key is not valid for resource '{0}'")]
    WrongResource(String),

    #[error("Unknown scope '{0}'")]
    InvalidScope(String),

    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Key store error: {0}")]
    Store(String),
}

impl atelier_common::AtelierError for ApiKeyError {}

/// Persistence for API keys
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert(&self, record: ApiKeyRecord) -> Result<(), ApiKeyError>;

    async fn find_by_kid(&self, kid: &str) -> Result<Option<ApiKeyRecord>, ApiKeyError>;

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<ApiKeyRecord>, ApiKeyError>;

    /// Returns false when no active key of that owner matched
    async fn revoke(&self, kid: &str, owner: &str) -> Result<bool, ApiKeyError>;

    async fn touch(&self, kid: &str) -> Result<(), ApiKeyError>;
}

#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn insert(&self, record: ApiKeyRecord) -> Result<(), ApiKeyError> {
        let mut keys = self.keys.write();
        if keys.contains_key(&record.kid) {
            return Err(ApiKeyError::Store(format!("duplicate kid {}", record.kid)));
        }
        keys.insert(record.kid.clone(), record);
        Ok(())
    }

    async fn find_by_kid(&self, kid: &str) -> Result<Option<ApiKeyRecord>, ApiKeyError> {
        Ok(self.keys.read().get(kid).cloned())
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<ApiKeyRecord>, ApiKeyError> {
        let mut keys: Vec<ApiKeyRecord> = self
            .keys
            .read()
            .values()
            .filter(|k| k.owner == owner)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn revoke(&self, kid: &str, owner: &str) -> Result<bool, ApiKeyError> {
        let mut keys = self.keys.write();
        match keys.get_mut(kid) {
            Some(key) if key.owner == owner && key.revoked_at.is_none() => {
                key.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch(&self, kid: &str) -> Result<(), ApiKeyError> {
        if let Some(key) = self.keys.write().get_mut(kid) {
            key.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Generate a new key id, secret and hash
pub fn generate_api_key() -> Result<GeneratedApiKey, ApiKeyError> {
    let kid_bytes: [u8; 8] = OsRng.gen();
    let kid = hex::encode(kid_bytes);

    let secret_bytes: [u8; 32] = OsRng.gen();
    let secret = URL_SAFE_NO_PAD.encode(secret_bytes);

    let display_token = format!("{TOKEN_PREFIX}_{kid}_{secret}");

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| ApiKeyError::Hashing(e.to_string()))?
        .to_string();

    Ok(GeneratedApiKey {
        kid,
        secret,
        display_token,
        hash,
    })
}

/// Split a display token into kid and secret
///
/// The secret is base64url and may itself contain `_`.
pub fn parse_display_token(token: &str) -> Result<(String, String), ApiKeyError> {
    let mut parts = token.splitn(3, '_');
    let (Some(prefix), Some(kid), Some(secret)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(ApiKeyError::InvalidFormat);
    };

    if prefix != TOKEN_PREFIX || secret.is_empty() {
        return Err(ApiKeyError::InvalidFormat);
    }
    if kid.len() != KID_HEX_LEN || !kid.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiKeyError::InvalidFormat);
    }

    Ok((kid.to_string(), secret.to_string()))
}

/// Create and store a key; returns the display token, which is never
/// recoverable afterwards
pub async fn issue_api_key(
    store: &dyn ApiKeyStore,
    owner: &str,
    name: ApiKeyName,
    resource: &str,
    scopes: Vec<String>,
) -> Result<String, ApiKeyError> {
    if let Some(unknown) = scopes
        .iter()
        .find(|s| s.as_str() != WILDCARD && scopes::known(s).is_none())
    {
        return Err(ApiKeyError::InvalidScope(unknown.clone()));
    }

    let generated = generate_api_key()?;
    store
        .insert(ApiKeyRecord {
            kid: generated.kid.clone(),
            name,
            owner: owner.to_string(),
            resource: resource.to_string(),
            hash: generated.hash,
            scopes,
            created_at: Utc::now(),
            revoked_at: None,
            last_used_at: None,
        })
        .await?;

    info!(kid = %generated.kid, owner, resource, "Issued API key");
    Ok(generated.display_token)
}

/// Verify a display token for use against `resource`
pub async fn verify_api_key(
    store: &dyn ApiKeyStore,
    token: &str,
    resource: &str,
) -> Result<VerifiedApiKey, ApiKeyError> {
    let (kid, secret) = parse_display_token(token)?;

    let key = store
        .find_by_kid(&kid)
        .await?
        .ok_or(ApiKeyError::NotFound)?;

    if key.revoked_at.is_some() {
        return Err(ApiKeyError::Revoked);
    }

    let parsed_hash =
        PasswordHash::new(&key.hash).map_err(|e| ApiKeyError::Hashing(e.to_string()))?;
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .map_err(|_| ApiKeyError::InvalidSecret)?;

    if key.resource != resource {
        return Err(ApiKeyError::WrongResource(resource.to_string()));
    }

    if let Err(e) = store.touch(&kid).await {
        debug!("Failed to update last_used_at for API key: {}", e);
    }

    Ok(VerifiedApiKey {
        kid,
        owner: key.owner,
        resource: key.resource,
        scopes: key.scopes,
    })
}
