#![allow(dead_code)]

use async_trait::async_trait;
use atelier_auth::{
    CacheSettings, JwksDocument, KeySetCache, KeySetFetchError, KeySetSource, TokenValidator,
    ValidationSettings,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const ISSUER: &str = "https://id.atelier.test/";
pub const AUDIENCE: &str = "https://api.atelier.test";
pub const ROLE_CLAIM: &str = "https://atelier.app/role";

/// Ed25519 signing key published under a key id
pub struct TestKey {
    pub kid: String,
    seed: [u8; 32],
}

impl TestKey {
    pub fn new(kid: &str, seed: u8) -> Self {
        Self {
            kid: kid.to_string(),
            seed: [seed; 32],
        }
    }

    pub fn jwk(&self) -> Value {
        let public_key = Ed25519SigningKey::from_bytes(&self.seed)
            .verifying_key()
            .to_bytes();
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "alg": "EdDSA",
            "use": "sig",
            "kid": self.kid,
            "x": URL_SAFE_NO_PAD.encode(public_key),
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(claims, Some(&self.kid))
    }

    pub fn sign_with_kid(&self, claims: &Value, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = kid.map(str::to_string);
        let der = Ed25519SigningKey::from_bytes(&self.seed)
            .to_pkcs8_der()
            .expect("der");
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(der.as_bytes()))
            .expect("encode")
    }
}

pub fn jwks(keys: &[&TestKey]) -> JwksDocument {
    JwksDocument {
        keys: keys.iter().map(|k| k.jwk()).collect(),
    }
}

pub fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Claims of a valid user token
pub fn user_claims(subject: &str, role: &str, tenant: Option<&str>) -> Value {
    let now = now_epoch_seconds();
    let mut claims = json!({
        "sub": subject,
        "iss": ISSUER,
        "aud": [AUDIENCE],
        "iat": now,
        "exp": now + 600,
    });
    claims[ROLE_CLAIM] = json!(role);
    if let Some(tenant) = tenant {
        claims["org_id"] = json!(tenant);
    }
    claims
}

/// Claims of a valid client-credentials token
pub fn service_claims(client_id: &str, scope: &str) -> Value {
    let now = now_epoch_seconds();
    json!({
        "sub": format!("{client_id}@clients"),
        "azp": client_id,
        "gty": "client-credentials",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
        "scope": scope,
    })
}

/// Key set source whose document and availability tests control
pub struct ScriptedSource {
    document: Mutex<JwksDocument>,
    failing: AtomicBool,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedSource {
    pub fn new(document: JwksDocument) -> Arc<Self> {
        Self::with_delay(document, Duration::ZERO)
    }

    pub fn with_delay(document: JwksDocument, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            document: Mutex::new(document),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn publish(&self, document: JwksDocument) {
        *self.document.lock() = document;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetSource for ScriptedSource {
    async fn fetch(&self) -> Result<JwksDocument, KeySetFetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(KeySetFetchError::Request("connection refused".to_string()));
        }
        Ok(self.document.lock().clone())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

pub fn validation_settings() -> ValidationSettings {
    ValidationSettings::new(ISSUER, vec![AUDIENCE.to_string()])
}

pub async fn validator(
    source: Arc<ScriptedSource>,
    cache_settings: CacheSettings,
    settings: ValidationSettings,
) -> (Arc<KeySetCache>, TokenValidator) {
    let cache = Arc::new(
        KeySetCache::initialize(source, cache_settings)
            .await
            .expect("initialize cache"),
    );
    let validator = TokenValidator::new(cache.clone(), settings);
    (cache, validator)
}
