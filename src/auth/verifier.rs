//! Per-issuer signature verification.
//!
//! # Responsibilities
//! - Turn `[[issuers]]` key material into verifiers once, at load time
//! - Map an issuer string to its verifier (closed, read-only registry)
//! - Check a token signature against the issuer's keys
//!
//! # Design Decisions
//! - Key material problems are startup-fatal, never per-request errors
//! - Verifiers are pure and lock-free; the registry is shared via `Arc`
//! - The `alg` header must be one the key accepts (no algorithm confusion)

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use thiserror::Error;

use crate::config::schema::{IssuerConfig, PemKeyType};

/// Errors raised while building verifiers from configuration.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("issuer `{0}` has no key source")]
    NoKeySource(String),

    #[error("issuer `{issuer}` has an invalid key: {source}")]
    InvalidKey {
        issuer: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },

    #[error("issuer `{issuer}` has an invalid JWKS document: {source}")]
    InvalidJwks {
        issuer: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("issuer `{issuer}` lists unknown algorithm `{alg}`")]
    UnknownAlgorithm { issuer: String, alg: String },

    #[error("issuer `{issuer}` allows `{alg}`, which does not fit its key type")]
    AlgorithmFamily { issuer: String, alg: String },
}

/// Signature check capability for one issuer.
pub trait Verifier: Send + Sync + fmt::Debug {
    /// Returns true if `signature` is a valid signature over `signing_input`.
    fn verify(&self, header: &Header, signing_input: &str, signature: &str) -> bool;
}

const HMAC: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
const RSA: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];
const EC: &[Algorithm] = &[Algorithm::ES256, Algorithm::ES384];
const ED: &[Algorithm] = &[Algorithm::EdDSA];

/// Verifies with a single key.
pub struct KeyVerifier {
    key: DecodingKey,
    algorithms: Vec<Algorithm>,
}

impl KeyVerifier {
    pub fn new(key: DecodingKey, algorithms: Vec<Algorithm>) -> Self {
        Self { key, algorithms }
    }

    /// HMAC verifier accepting HS256/384/512.
    pub fn hmac(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret), HMAC.to_vec())
    }
}

impl fmt::Debug for KeyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyVerifier")
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl Verifier for KeyVerifier {
    fn verify(&self, header: &Header, signing_input: &str, signature: &str) -> bool {
        if !self.algorithms.contains(&header.alg) {
            return false;
        }
        jsonwebtoken::crypto::verify(signature, signing_input.as_bytes(), &self.key, header.alg)
            .unwrap_or(false)
    }
}

struct JwkEntry {
    kid: Option<String>,
    algorithm: Option<Algorithm>,
    family: &'static [Algorithm],
    key: DecodingKey,
}

impl JwkEntry {
    /// The token's `alg` must belong to the key type, and match the key's
    /// own `alg` when it declares one.
    fn accepts(&self, alg: Algorithm) -> bool {
        self.family.contains(&alg) && self.algorithm.map_or(true, |own| own == alg)
    }
}

fn key_family(params: &AlgorithmParameters) -> &'static [Algorithm] {
    match params {
        AlgorithmParameters::RSA(_) => RSA,
        AlgorithmParameters::EllipticCurve(_) => EC,
        AlgorithmParameters::OctetKeyPair(_) => ED,
        AlgorithmParameters::OctetKey(_) => HMAC,
    }
}

/// Verifies against a JSON Web Key Set, selecting keys by `kid`.
pub struct JwksVerifier {
    keys: Vec<JwkEntry>,
    algorithms: Vec<Algorithm>,
}

impl JwksVerifier {
    /// Build from a parsed key set. Encryption-only keys are skipped.
    pub fn new(jwks: &JwkSet, algorithms: Vec<Algorithm>) -> Result<Self, jsonwebtoken::errors::Error> {
        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
                continue;
            }
            let algorithm = match &jwk.common.key_algorithm {
                // Encryption algorithms have no signing counterpart.
                Some(alg) => match Algorithm::from_str(&format!("{:?}", alg)) {
                    Ok(alg) => Some(alg),
                    Err(_) => continue,
                },
                None => None,
            };
            let family = key_family(&jwk.algorithm);
            if algorithm.is_some_and(|alg| !family.contains(&alg)) {
                tracing::warn!(kid = ?jwk.common.key_id, ?algorithm, "Skipping JWK whose alg does not fit its key type");
                continue;
            }
            keys.push(JwkEntry {
                kid: jwk.common.key_id.clone(),
                algorithm,
                family,
                key: DecodingKey::from_jwk(jwk)?,
            });
        }
        Ok(Self { keys, algorithms })
    }
}

impl fmt::Debug for JwksVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kids: Vec<_> = self.keys.iter().map(|k| k.kid.as_deref()).collect();
        f.debug_struct("JwksVerifier")
            .field("kids", &kids)
            .field("algorithms", &self.algorithms)
            .finish()
    }
}

impl Verifier for JwksVerifier {
    fn verify(&self, header: &Header, signing_input: &str, signature: &str) -> bool {
        if !self.algorithms.is_empty() && !self.algorithms.contains(&header.alg) {
            return false;
        }
        self.keys
            .iter()
            .filter(|entry| match (&header.kid, &entry.kid) {
                (Some(wanted), Some(kid)) => wanted == kid,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .filter(|entry| entry.accepts(header.alg))
            .any(|entry| {
                jsonwebtoken::crypto::verify(
                    signature,
                    signing_input.as_bytes(),
                    &entry.key,
                    header.alg,
                )
                .unwrap_or(false)
            })
    }
}

/// Closed mapping from issuer to verifier, built once and never mutated.
#[derive(Debug, Clone, Default)]
pub struct IssuerRegistry {
    verifiers: HashMap<String, Arc<dyn Verifier>>,
}

impl IssuerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a verifier. Only used while building the registry.
    pub fn with_verifier(mut self, issuer: impl Into<String>, verifier: Arc<dyn Verifier>) -> Self {
        self.verifiers.insert(issuer.into(), verifier);
        self
    }

    /// Build verifiers for every configured issuer.
    pub fn from_config(issuers: &[IssuerConfig]) -> Result<Self, KeyError> {
        let mut registry = Self::new();
        for issuer in issuers {
            let verifier = build_verifier(issuer)?;
            tracing::debug!(issuer = %issuer.issuer, ?verifier, "Issuer keys loaded");
            registry = registry.with_verifier(issuer.issuer.clone(), verifier);
        }
        Ok(registry)
    }

    pub fn get(&self, issuer: &str) -> Option<&dyn Verifier> {
        self.verifiers.get(issuer).map(|v| v.as_ref())
    }

    pub fn contains(&self, issuer: &str) -> bool {
        self.verifiers.contains_key(issuer)
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

fn build_verifier(config: &IssuerConfig) -> Result<Arc<dyn Verifier>, KeyError> {
    let issuer = &config.issuer;
    let invalid_key = |source: jsonwebtoken::errors::Error| KeyError::InvalidKey {
        issuer: issuer.clone(),
        source,
    };

    if let Some(secret) = &config.secret {
        let algorithms = allowed_algorithms(config, HMAC)?;
        let key = DecodingKey::from_secret(secret.as_bytes());
        return Ok(Arc::new(KeyVerifier::new(key, algorithms)));
    }

    if let Some(pem) = &config.public_key_pem {
        let (key, family) = match config.key_type {
            PemKeyType::Rsa => (DecodingKey::from_rsa_pem(pem.as_bytes()), RSA),
            PemKeyType::Ec => (DecodingKey::from_ec_pem(pem.as_bytes()), EC),
            PemKeyType::Ed => (DecodingKey::from_ed_pem(pem.as_bytes()), ED),
        };
        let key = key.map_err(invalid_key)?;
        let algorithms = allowed_algorithms(config, family)?;
        return Ok(Arc::new(KeyVerifier::new(key, algorithms)));
    }

    if let Some(jwks) = &config.jwks {
        let set: JwkSet = serde_json::from_str(jwks).map_err(|source| KeyError::InvalidJwks {
            issuer: issuer.clone(),
            source,
        })?;
        let algorithms = parse_algorithms(config)?;
        let verifier = JwksVerifier::new(&set, algorithms).map_err(invalid_key)?;
        return Ok(Arc::new(verifier));
    }

    Err(KeyError::NoKeySource(issuer.clone()))
}

fn parse_algorithms(config: &IssuerConfig) -> Result<Vec<Algorithm>, KeyError> {
    config
        .algorithms
        .iter()
        .map(|alg| {
            Algorithm::from_str(alg).map_err(|_| KeyError::UnknownAlgorithm {
                issuer: config.issuer.clone(),
                alg: alg.clone(),
            })
        })
        .collect()
}

fn allowed_algorithms(config: &IssuerConfig, family: &[Algorithm]) -> Result<Vec<Algorithm>, KeyError> {
    let configured = parse_algorithms(config)?;
    if configured.is_empty() {
        return Ok(family.to_vec());
    }
    if let Some(alg) = configured.iter().find(|alg| !family.contains(alg)) {
        return Err(KeyError::AlgorithmFamily {
            issuer: config.issuer.clone(),
            alg: format!("{:?}", alg),
        });
    }
    Ok(configured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::ParsedToken;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use jsonwebtoken::{encode, EncodingKey};
    use serde_json::json;

    const EC_PRIVATE: &str = include_str!("../../tests/fixtures/ec_private.pem");
    const EC_PUBLIC: &str = include_str!("../../tests/fixtures/ec_public.pem");

    fn issuer_config(issuer: &str) -> IssuerConfig {
        IssuerConfig {
            issuer: issuer.into(),
            secret: None,
            public_key_pem: None,
            key_type: PemKeyType::Rsa,
            jwks: None,
            algorithms: Vec::new(),
        }
    }

    fn hs_token(alg: Algorithm, secret: &[u8], kid: Option<&str>) -> String {
        let mut header = Header::new(alg);
        header.kid = kid.map(str::to_string);
        encode(&header, &json!({"iss": "a"}), &EncodingKey::from_secret(secret)).unwrap()
    }

    fn check(verifier: &dyn Verifier, token: &str) -> bool {
        let parsed = ParsedToken::parse(token).unwrap();
        verifier.verify(&parsed.header, parsed.signing_input, parsed.signature)
    }

    #[test]
    fn test_hmac_accepts_own_signature_only() {
        let verifier = KeyVerifier::hmac(b"secret-one");
        assert!(check(&verifier, &hs_token(Algorithm::HS256, b"secret-one", None)));
        assert!(check(&verifier, &hs_token(Algorithm::HS512, b"secret-one", None)));
        assert!(!check(&verifier, &hs_token(Algorithm::HS256, b"secret-two", None)));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let verifier = KeyVerifier::hmac(b"secret-one");
        let token = hs_token(Algorithm::HS256, b"secret-one", None);
        let other = hs_token(Algorithm::HS256, b"secret-one", Some("k"));
        // Signature from one token, header+payload from another.
        let (_, sig) = token.rsplit_once('.').unwrap();
        let (input, _) = other.rsplit_once('.').unwrap();
        assert!(!check(&verifier, &format!("{}.{}", input, sig)));
    }

    #[test]
    fn test_algorithm_restriction() {
        let mut config = issuer_config("a");
        config.secret = Some("secret-one".into());
        config.algorithms = vec!["HS384".into()];
        let registry = IssuerRegistry::from_config(&[config]).unwrap();
        let verifier = registry.get("a").unwrap();
        assert!(!check(verifier, &hs_token(Algorithm::HS256, b"secret-one", None)));
        assert!(check(verifier, &hs_token(Algorithm::HS384, b"secret-one", None)));
    }

    #[test]
    fn test_algorithm_must_fit_key_family() {
        let mut config = issuer_config("a");
        config.secret = Some("secret-one".into());
        config.algorithms = vec!["RS256".into()];
        assert!(matches!(
            IssuerRegistry::from_config(&[config]),
            Err(KeyError::AlgorithmFamily { .. })
        ));

        let mut config = issuer_config("b");
        config.secret = Some("secret-one".into());
        config.algorithms = vec!["XX999".into()];
        assert!(matches!(
            IssuerRegistry::from_config(&[config]),
            Err(KeyError::UnknownAlgorithm { .. })
        ));
    }

    #[test]
    fn test_ec_public_key() {
        let mut config = issuer_config("ec");
        config.public_key_pem = Some(EC_PUBLIC.into());
        config.key_type = PemKeyType::Ec;
        let registry = IssuerRegistry::from_config(&[config]).unwrap();

        let key = EncodingKey::from_ec_pem(EC_PRIVATE.as_bytes()).unwrap();
        let token = encode(&Header::new(Algorithm::ES256), &json!({"iss": "ec"}), &key).unwrap();
        assert!(check(registry.get("ec").unwrap(), &token));

        // An HMAC token signed with the public key bytes must not pass.
        let confused = hs_token(Algorithm::HS256, EC_PUBLIC.as_bytes(), None);
        assert!(!check(registry.get("ec").unwrap(), &confused));
    }

    #[test]
    fn test_invalid_pem_is_startup_error() {
        let mut config = issuer_config("rsa");
        config.public_key_pem = Some("not a pem".into());
        assert!(matches!(
            IssuerRegistry::from_config(&[config]),
            Err(KeyError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_jwks_selects_by_kid() {
        // 12-byte secrets encode identically in base64 and base64url.
        let jwks = json!({
            "keys": [
                {"kty": "oct", "kid": "k1", "alg": "HS256", "k": "c2VjcmV0a2V5MTIz"},
                {"kty": "oct", "kid": "k2", "alg": "HS256", "k": "b3RoZXJrZXk0NTY3"}
            ]
        });
        let mut config = issuer_config("jwks");
        config.jwks = Some(jwks.to_string());
        let registry = IssuerRegistry::from_config(&[config]).unwrap();
        let verifier = registry.get("jwks").unwrap();

        assert!(check(verifier, &hs_token(Algorithm::HS256, b"secretkey123", Some("k1"))));
        assert!(check(verifier, &hs_token(Algorithm::HS256, b"secretkey123", None)));
        assert!(!check(verifier, &hs_token(Algorithm::HS256, b"secretkey123", Some("k2"))));
        assert!(!check(verifier, &hs_token(Algorithm::HS256, b"secretkey123", Some("k9"))));
        // Key declares HS256 only.
        assert!(!check(verifier, &hs_token(Algorithm::HS384, b"secretkey123", Some("k1"))));
    }

    const EC_X: &str = "jnwxMYDWqxk4EX_K7fyoswv5H4oG8z7g9w4tuTx7l0A";
    const EC_Y: &str = "vYoVDUme-gG3K1JP9qmmOh_deUO9u5kNv_OZcZ4Y4-8";

    fn jwks_registry(keys: serde_json::Value) -> IssuerRegistry {
        let mut config = issuer_config("jwks");
        config.jwks = Some(json!({ "keys": [keys] }).to_string());
        IssuerRegistry::from_config(&[config]).unwrap()
    }

    #[test]
    fn test_jwks_key_without_alg_is_bound_to_its_key_type() {
        let registry = jwks_registry(json!({"kty": "EC", "crv": "P-256", "x": EC_X, "y": EC_Y}));
        let verifier = registry.get("jwks").unwrap();

        let key = EncodingKey::from_ec_pem(EC_PRIVATE.as_bytes()).unwrap();
        let token = encode(&Header::new(Algorithm::ES256), &json!({"iss": "jwks"}), &key).unwrap();
        assert!(check(verifier, &token));

        // HMAC keyed with the public point (0x04 || x || y) must not verify.
        let mut point = vec![0x04];
        point.extend(URL_SAFE_NO_PAD.decode(EC_X).unwrap());
        point.extend(URL_SAFE_NO_PAD.decode(EC_Y).unwrap());
        assert!(!check(verifier, &hs_token(Algorithm::HS256, &point, None)));
        assert!(!check(verifier, &hs_token(Algorithm::HS256, b"anything", None)));
    }

    #[test]
    fn test_jwks_rsa_key_rejects_hmac_header() {
        let registry = jwks_registry(json!({
            "kty": "RSA",
            "n": "sXchDaQebHnPiGvyDOAT4saG",
            "e": "AQAB"
        }));
        let verifier = registry.get("jwks").unwrap();
        assert!(!check(verifier, &hs_token(Algorithm::HS256, b"secretkey123", None)));
    }

    #[test]
    fn test_jwks_skips_key_with_mismatched_alg() {
        let registry = jwks_registry(json!({"kty": "EC", "crv": "P-256", "alg": "HS256", "x": EC_X, "y": EC_Y}));
        let verifier = registry.get("jwks").unwrap();
        assert!(!check(verifier, &hs_token(Algorithm::HS256, b"anything", None)));
    }

    #[test]
    fn test_invalid_jwks_document() {
        let mut config = issuer_config("jwks");
        config.jwks = Some("{".into());
        assert!(matches!(
            IssuerRegistry::from_config(&[config]),
            Err(KeyError::InvalidJwks { .. })
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = IssuerRegistry::new().with_verifier("a", Arc::new(KeyVerifier::hmac(b"x")));
        assert!(registry.contains("a"));
        assert!(registry.get("b").is_none());
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
