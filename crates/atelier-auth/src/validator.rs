//! Bearer token extraction and verification

use http::header::AUTHORIZATION;
use http::HeaderMap;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::cache::KeySetCache;
use crate::claims::{ClaimNames, Claims, RawClaims};
use crate::error::{AuthError, Result};
use crate::metrics;

const BEARER_PREFIX: &str = "Bearer ";

/// Algorithms a public key set can verify
pub const ASYMMETRIC_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::malformed("authorization header is not valid ASCII"))?;
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| AuthError::malformed("authorization scheme must be Bearer"))?
        .trim();
    if token.is_empty() {
        return Err(AuthError::malformed("empty bearer token"));
    }
    Ok(token)
}

/// What a token must satisfy besides a valid signature
#[derive(Debug, Clone)]
pub struct ValidationSettings {
    pub issuer: String,
    pub audiences: Vec<String>,
    pub validate_issuer: bool,
    pub validate_audience: bool,
    /// Leeway applied to `exp`, `nbf` and `iat`
    pub clock_skew: Duration,
    pub algorithms: Vec<Algorithm>,
    /// Fail with `KeySetStale` instead of warning once the cache is degraded
    pub reject_when_degraded: bool,
    pub claim_names: ClaimNames,
}

impl ValidationSettings {
    pub fn new(issuer: impl Into<String>, audiences: Vec<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audiences,
            validate_issuer: true,
            validate_audience: true,
            clock_skew: Duration::from_secs(60),
            algorithms: ASYMMETRIC_ALGORITHMS.to_vec(),
            reject_when_degraded: false,
            claim_names: ClaimNames::default(),
        }
    }
}

/// A token that passed every check, with its payload
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub claims: RawClaims,
    pub kid: Option<String>,
    pub algorithm: Algorithm,
    /// Generation of the key set that verified the signature
    pub key_set_generation: u64,
}

pub struct TokenValidator {
    cache: Arc<KeySetCache>,
    settings: ValidationSettings,
}

impl TokenValidator {
    pub fn new(cache: Arc<KeySetCache>, mut settings: ValidationSettings) -> Self {
        settings.algorithms.retain(|alg| {
            let allowed = ASYMMETRIC_ALGORITHMS.contains(alg);
            if !allowed {
                warn!(algorithm = ?alg, "Dropping symmetric algorithm from accepted list");
            }
            allowed
        });
        Self { cache, settings }
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<KeySetCache> {
        &self.cache
    }

    /// Verify signature and registered claims against the current key set
    ///
    /// Reads a single key set snapshot; never fetches.
    #[instrument(level = "debug", skip_all)]
    pub fn validate_token(&self, token: &str) -> Result<VerifiedToken> {
        let result = self.verify(token);
        metrics::record_validation(match &result {
            Ok(_) => "ok",
            Err(err) => err.error_code(),
        });
        result
    }

    /// Header extraction, verification and claim extraction in one step
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims> {
        let token = extract_bearer_token(headers)?;
        let verified = self.validate_token(token)?;
        self.claims(verified)
    }

    pub fn claims(&self, token: VerifiedToken) -> Result<Claims> {
        Claims::from_verified(token.claims, &self.settings.claim_names)
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken> {
        let header = decode_header(token)
            .map_err(|e| AuthError::malformed(format!("invalid token header: {e}")))?;
        if !self.settings.algorithms.contains(&header.alg) {
            return Err(AuthError::malformed(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }

        let key_set = self.cache.key_set();
        if self.cache.is_degraded() {
            let age_secs = key_set.age().as_secs();
            if self.settings.reject_when_degraded {
                return Err(AuthError::KeySetStale { age_secs });
            }
            warn!(age_secs, "Validating against a key set past its staleness ceiling");
            metrics::record_degraded_validation();
        }

        let candidates = key_set.candidates(header.kid.as_deref(), header.alg);
        if candidates.is_empty() {
            debug!(kid = ?header.kid, "No key in the current set matches the token");
            return Err(AuthError::InvalidSignature);
        }

        let validation = self.jwt_validation(header.alg);
        for key in candidates {
            match decode::<RawClaims>(token, key.decoding_key(), &validation) {
                Ok(data) => {
                    self.check_registered_claims(&data.claims)?;
                    return Ok(VerifiedToken {
                        claims: data.claims,
                        kid: header.kid.clone(),
                        algorithm: header.alg,
                        key_set_generation: key_set.generation(),
                    });
                }
                Err(err) => match map_jwt_error(&err) {
                    AuthError::InvalidSignature => continue,
                    // signature verified, claims did not
                    other => return Err(other),
                },
            }
        }

        Err(AuthError::InvalidSignature)
    }

    fn jwt_validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = self.settings.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // issuer and audience are checked afterwards for precise errors
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    fn check_registered_claims(&self, claims: &RawClaims) -> Result<()> {
        if let Some(iat) = claims.iat {
            let now = chrono::Utc::now().timestamp();
            let skew = self.settings.clock_skew.as_secs() as i64;
            if iat > now + skew {
                return Err(AuthError::ExpiredToken);
            }
        }

        if self.settings.validate_issuer && claims.iss.as_deref() != Some(self.settings.issuer.as_str()) {
            return Err(AuthError::IssuerMismatch {
                actual: claims.iss.clone().unwrap_or_default(),
            });
        }

        if self.settings.validate_audience {
            let accepted = claims.aud.clone().map(|aud| aud.into_vec()).unwrap_or_default();
            if !accepted
                .iter()
                .any(|aud| self.settings.audiences.contains(aud))
            {
                return Err(AuthError::AudienceMismatch);
            }
        }

        Ok(())
    }
}

fn map_jwt_error(err: &JwtError) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::ExpiredToken,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidRsaKey(_) => AuthError::InvalidSignature,
        _ => AuthError::malformed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(value: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(value).unwrap());
        headers
    }

    #[test]
    fn test_extracts_bearer_token() {
        assert_eq!(extract_bearer_token(&headers(b"Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            extract_bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn test_rejects_other_schemes_and_empty_tokens() {
        for value in [
            &b"Basic dXNlcjpwYXNz"[..],
            b"bearer abc",
            b"Bearer",
            b"Bearer    ",
            b"abc.def.ghi",
        ] {
            assert!(
                matches!(
                    extract_bearer_token(&headers(value)),
                    Err(AuthError::MalformedCredential { .. })
                ),
                "{:?}",
                String::from_utf8_lossy(value)
            );
        }
    }

    #[test]
    fn test_rejects_non_ascii_header() {
        assert!(matches!(
            extract_bearer_token(&headers(b"Bearer \xe2\x9c\x93")),
            Err(AuthError::MalformedCredential { .. })
        ));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            map_jwt_error(&ErrorKind::ExpiredSignature.into()),
            AuthError::ExpiredToken
        );
        assert_eq!(
            map_jwt_error(&ErrorKind::InvalidSignature.into()),
            AuthError::InvalidSignature
        );
        assert!(matches!(
            map_jwt_error(&ErrorKind::InvalidToken.into()),
            AuthError::MalformedCredential { .. }
        ));
    }
}
