//! Immutable snapshot of the identity provider's signing keys
//!
//! A [`KeySet`] is built once from a JWKS document and never mutated; the
//! cache replaces it wholesale on refresh.

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::KeySetFetchError;

/// Raw JWKS document as served by the identity provider
///
/// Keys are kept as raw JSON so one unsupported entry does not invalidate
/// the whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Value>,
}

/// A single public key usable for signature verification
#[derive(Clone)]
pub struct VerificationKey {
    kid: Option<String>,
    algorithms: Vec<Algorithm>,
    key: DecodingKey,
}

impl VerificationKey {
    fn from_jwk(jwk: &Jwk) -> Option<Self> {
        if let Some(key_use) = &jwk.common.public_key_use {
            if *key_use != PublicKeyUse::Signature {
                debug!(kid = ?jwk.common.key_id, "Skipping JWK not intended for signatures");
                return None;
            }
        }

        let algorithms = match jwk.common.key_algorithm {
            Some(alg) => signing_algorithm(alg).into_iter().collect(),
            None => default_algorithms(&jwk.algorithm),
        };
        if algorithms.is_empty() {
            debug!(kid = ?jwk.common.key_id, "Skipping JWK with unsupported algorithm");
            return None;
        }

        let key = match DecodingKey::from_jwk(jwk) {
            Ok(key) => key,
            Err(e) => {
                warn!(kid = ?jwk.common.key_id, "Skipping JWK that cannot be decoded: {}", e);
                return None;
            }
        };

        Some(Self {
            kid: jwk.common.key_id.clone(),
            algorithms,
            key,
        })
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn supports(&self, alg: Algorithm) -> bool {
        self.algorithms.contains(&alg)
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// Map a JWK `alg` to a signature algorithm. Symmetric and encryption
/// algorithms are never accepted from a public key set.
fn signing_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

fn default_algorithms(params: &AlgorithmParameters) -> Vec<Algorithm> {
    match params {
        AlgorithmParameters::RSA(_) => vec![
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ],
        AlgorithmParameters::EllipticCurve(ec) => match ec.curve {
            EllipticCurve::P256 => vec![Algorithm::ES256],
            EllipticCurve::P384 => vec![Algorithm::ES384],
            _ => Vec::new(),
        },
        AlgorithmParameters::OctetKeyPair(okp) => match okp.curve {
            EllipticCurve::Ed25519 => vec![Algorithm::EdDSA],
            _ => Vec::new(),
        },
        AlgorithmParameters::OctetKey(_) => Vec::new(),
    }
}

/// Verification keys indexed by key id
pub struct KeySet {
    by_kid: HashMap<String, VerificationKey>,
    without_kid: Vec<VerificationKey>,
    generation: u64,
    fetched_at: Instant,
}

impl KeySet {
    /// Build a key set from a JWKS document, skipping entries that cannot
    /// verify signatures.
    pub fn from_document(
        document: &JwksDocument,
        generation: u64,
    ) -> Result<Self, KeySetFetchError> {
        let mut by_kid = HashMap::new();
        let mut without_kid = Vec::new();

        for raw in &document.keys {
            let jwk: Jwk = match serde_json::from_value(raw.clone()) {
                Ok(jwk) => jwk,
                Err(e) => {
                    warn!("Skipping unparseable JWK: {}", e);
                    continue;
                }
            };
            let Some(key) = VerificationKey::from_jwk(&jwk) else {
                continue;
            };
            match key.kid.clone() {
                Some(kid) => {
                    if by_kid.contains_key(&kid) {
                        warn!(kid = %kid, "Duplicate key id in JWKS, keeping the first entry");
                        continue;
                    }
                    by_kid.insert(kid, key);
                }
                None => without_kid.push(key),
            }
        }

        if by_kid.is_empty() && without_kid.is_empty() {
            return Err(KeySetFetchError::NoUsableKeys);
        }

        Ok(Self {
            by_kid,
            without_kid,
            generation,
            fetched_at: Instant::now(),
        })
    }

    /// Keys that may have produced a token with the given header values
    ///
    /// With a `kid` only the matching key is returned; without one every key
    /// supporting the algorithm is a candidate.
    pub fn candidates(&self, kid: Option<&str>, alg: Algorithm) -> Vec<&VerificationKey> {
        match kid {
            Some(kid) => self
                .by_kid
                .get(kid)
                .filter(|key| key.supports(alg))
                .into_iter()
                .collect(),
            None => self
                .by_kid
                .values()
                .chain(self.without_kid.iter())
                .filter(|key| key.supports(alg))
                .collect(),
        }
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.by_kid.contains_key(kid)
    }

    /// Sorted key ids, for diagnostics
    pub fn key_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_kid.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_kid.len() + self.without_kid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter assigned by the cache; 1 for the startup fetch
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("generation", &self.generation)
            .field("key_ids", &self.key_ids())
            .field("keys_without_kid", &self.without_kid.len())
            .finish()
    }
}
