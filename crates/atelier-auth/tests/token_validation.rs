mod common;

use atelier_auth::{AuthError, CacheSettings, Identity, Role};
use common::*;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

async fn setup() -> (TestKey, atelier_auth::TokenValidator) {
    let key = TestKey::new("k1", 7);
    let source = ScriptedSource::new(jwks(&[&key]));
    let (_, validator) = validator(source, CacheSettings::default(), validation_settings()).await;
    (key, validator)
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let (key, validator) = setup().await;
    let token = key.sign(&user_claims("auth0|u1", "customer", Some("t1")));

    let verified = validator.validate_token(&token).unwrap();
    assert_eq!(verified.kid.as_deref(), Some("k1"));
    assert_eq!(verified.algorithm, Algorithm::EdDSA);
    assert_eq!(verified.key_set_generation, 1);

    let claims = validator.claims(verified).unwrap();
    assert_eq!(claims.subject.as_deref(), Some("auth0|u1"));
    assert_eq!(claims.tenant_id.unwrap().as_str(), "t1");
    assert_eq!(claims.roles, vec!["customer".to_string()]);
}

#[tokio::test]
async fn test_token_without_kid_tries_every_key() {
    let other = TestKey::new("k0", 3);
    let key = TestKey::new("k1", 7);
    let source = ScriptedSource::new(jwks(&[&other, &key]));
    let (_, validator) = validator(source, CacheSettings::default(), validation_settings()).await;

    let token = key.sign_with_kid(&user_claims("u1", "customer", None), None);
    assert!(validator.validate_token(&token).is_ok());
}

#[tokio::test]
async fn test_unknown_kid_is_invalid_signature() {
    let (_, validator) = setup().await;
    let stranger = TestKey::new("k9", 9);
    let token = stranger.sign(&user_claims("u1", "customer", None));

    assert_eq!(
        validator.validate_token(&token).unwrap_err(),
        AuthError::InvalidSignature
    );
}

#[tokio::test]
async fn test_wrong_key_under_known_kid_is_invalid_signature() {
    let (_, validator) = setup().await;
    let forger = TestKey::new("k1", 42);
    let token = forger.sign(&user_claims("u1", "platform_super_admin", None));

    assert_eq!(
        validator.validate_token(&token).unwrap_err(),
        AuthError::InvalidSignature
    );
}

#[tokio::test]
async fn test_expiry_honours_clock_skew() {
    let (key, validator) = setup().await;
    let now = now_epoch_seconds();

    let mut claims = user_claims("u1", "customer", None);
    claims["exp"] = json!(now - 30);
    assert!(validator.validate_token(&key.sign(&claims)).is_ok());

    claims["exp"] = json!(now - 120);
    assert_eq!(
        validator.validate_token(&key.sign(&claims)).unwrap_err(),
        AuthError::ExpiredToken
    );
}

#[tokio::test]
async fn test_not_yet_valid_tokens_are_rejected() {
    let (key, validator) = setup().await;
    let now = now_epoch_seconds();

    let mut claims = user_claims("u1", "customer", None);
    claims["nbf"] = json!(now + 300);
    assert_eq!(
        validator.validate_token(&key.sign(&claims)).unwrap_err(),
        AuthError::ExpiredToken
    );

    let mut claims = user_claims("u1", "customer", None);
    claims["iat"] = json!(now + 300);
    assert_eq!(
        validator.validate_token(&key.sign(&claims)).unwrap_err(),
        AuthError::ExpiredToken
    );
}

#[tokio::test]
async fn test_missing_exp_is_malformed() {
    let (key, validator) = setup().await;
    let mut claims = user_claims("u1", "customer", None);
    claims.as_object_mut().unwrap().remove("exp");

    assert!(matches!(
        validator.validate_token(&key.sign(&claims)),
        Err(AuthError::MalformedCredential { .. })
    ));
}

#[tokio::test]
async fn test_issuer_must_match_exactly() {
    let (key, validator) = setup().await;
    let mut claims = user_claims("u1", "customer", None);
    claims["iss"] = json!("https://id.atelier.test");

    assert_eq!(
        validator.validate_token(&key.sign(&claims)).unwrap_err(),
        AuthError::IssuerMismatch {
            actual: "https://id.atelier.test".to_string()
        }
    );
}

#[tokio::test]
async fn test_issuer_check_can_be_disabled() {
    let key = TestKey::new("k1", 7);
    let mut settings = validation_settings();
    settings.validate_issuer = false;
    let (_, validator) = validator(
        ScriptedSource::new(jwks(&[&key])),
        CacheSettings::default(),
        settings,
    )
    .await;

    let mut claims = user_claims("u1", "customer", None);
    claims["iss"] = json!("https://elsewhere.test/");
    assert!(validator.validate_token(&key.sign(&claims)).is_ok());
}

#[tokio::test]
async fn test_audience_must_intersect() {
    let (key, validator) = setup().await;

    let mut claims = user_claims("u1", "customer", None);
    claims["aud"] = json!(["https://other.test", AUDIENCE]);
    assert!(validator.validate_token(&key.sign(&claims)).is_ok());

    claims["aud"] = json!("https://other.test");
    assert_eq!(
        validator.validate_token(&key.sign(&claims)).unwrap_err(),
        AuthError::AudienceMismatch
    );

    claims.as_object_mut().unwrap().remove("aud");
    assert_eq!(
        validator.validate_token(&key.sign(&claims)).unwrap_err(),
        AuthError::AudienceMismatch
    );
}

#[tokio::test]
async fn test_symmetric_tokens_are_rejected() {
    let (_, validator) = setup().await;
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".to_string());
    let token = jsonwebtoken::encode(
        &header,
        &user_claims("u1", "customer", None),
        &EncodingKey::from_secret(b"shared-secret"),
    )
    .unwrap();

    assert!(matches!(
        validator.validate_token(&token),
        Err(AuthError::MalformedCredential { .. })
    ));
}

#[tokio::test]
async fn test_garbage_is_malformed() {
    let (_, validator) = setup().await;
    for token in ["", "not-a-jwt", "a.b.c"] {
        assert!(
            matches!(
                validator.validate_token(token),
                Err(AuthError::MalformedCredential { .. })
            ),
            "{token}"
        );
    }
}

#[tokio::test]
async fn test_degraded_cache_warns_or_rejects() {
    let key = TestKey::new("k1", 7);
    let cache_settings = CacheSettings {
        max_staleness: Some(Duration::ZERO),
        ..CacheSettings::default()
    };
    let token = key.sign(&user_claims("u1", "customer", None));

    let (cache, lenient) = validator(
        ScriptedSource::new(jwks(&[&key])),
        cache_settings.clone(),
        validation_settings(),
    )
    .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(cache.is_degraded());
    assert!(lenient.validate_token(&token).is_ok());

    let mut strict_settings = validation_settings();
    strict_settings.reject_when_degraded = true;
    let (_, strict) = validator(
        ScriptedSource::new(jwks(&[&key])),
        cache_settings,
        strict_settings,
    )
    .await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(matches!(
        strict.validate_token(&token),
        Err(AuthError::KeySetStale { .. })
    ));
}

#[tokio::test]
async fn test_authenticate_from_headers() {
    let (key, validator) = setup().await;
    let token = key.sign(&service_claims("svc-booking", "booking:read"));

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    let claims = validator.authenticate(&headers).unwrap();
    assert!(claims.is_machine());

    let identity = Identity::resolve(&claims, &atelier_auth::RoleScopeRegistry::new()).unwrap();
    assert!(identity.is_service());
    assert_eq!(identity.principal_id(), "svc-booking");

    assert_eq!(
        validator.authenticate(&HeaderMap::new()).unwrap_err(),
        AuthError::MissingCredential
    );
}

#[tokio::test]
async fn test_role_claim_flows_into_identity() {
    let (key, validator) = setup().await;
    let token = key.sign(&user_claims("u2", "tenant_admin", Some("t1")));

    let claims = validator
        .claims(validator.validate_token(&token).unwrap())
        .unwrap();
    let identity = Identity::resolve(&claims, &atelier_auth::RoleScopeRegistry::new()).unwrap();
    assert_eq!(identity.role(), Some(Role::TenantAdmin));
}
