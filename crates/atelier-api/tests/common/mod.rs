#![allow(dead_code)]

use atelier_api::{config::Config, provisioning::InMemoryProvisioner, server::Server};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ISSUER: &str = "https://id.atelier.test/";
pub const AUDIENCE: &str = "https://api.atelier.test";
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

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
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        let der = Ed25519SigningKey::from_bytes(&self.seed)
            .to_pkcs8_der()
            .expect("der");
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(der.as_bytes()))
            .expect("encode")
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn user_claims(subject: &str, role: &str, tenant: Option<&str>) -> Value {
    let now = now();
    let mut claims = json!({
        "sub": subject,
        "iss": ISSUER,
        "aud": [AUDIENCE],
        "iat": now,
        "exp": now + 600,
        "email": format!("{}@example.com", subject.trim_start_matches("auth0|")),
    });
    claims["https://atelier.app/role"] = json!(role);
    if let Some(tenant) = tenant {
        claims["org_id"] = json!(tenant);
    }
    claims
}

pub fn service_claims(client_id: &str, scope: &str, tenant: Option<&str>) -> Value {
    let now = now();
    let mut claims = json!({
        "sub": format!("{client_id}@clients"),
        "azp": client_id,
        "gty": "client-credentials",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + 600,
        "scope": scope,
    });
    if let Some(tenant) = tenant {
        claims["org_id"] = json!(tenant);
    }
    claims
}

/// Identity provider stand-in publishing `keys` as its JWKS
pub async fn jwks_server(keys: &[&TestKey]) -> MockServer {
    let server = MockServer::start().await;
    let document = json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() });
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(document))
        .mount(&server)
        .await;
    server
}

pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.auth.issuer = ISSUER.to_string();
    config.auth.audiences = vec![AUDIENCE.to_string()];
    config.auth.jwks_url = Some(format!("{}{}", server.uri(), JWKS_PATH));
    config
}

pub struct TestApp {
    pub router: Router,
    pub provisioner: Arc<InMemoryProvisioner>,
    pub server: Server,
}

pub async fn spawn_app(config: Config) -> TestApp {
    let provisioner = Arc::new(InMemoryProvisioner::new());
    let server = Server::new(config, provisioner.clone())
        .await
        .expect("server starts");
    TestApp {
        router: server.router(),
        provisioner,
        server,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}
