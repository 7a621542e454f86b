//! Route-level JWT validation.

use std::collections::BTreeSet;

use crate::auth::claims::{ParsedToken, ValidatedClaims};
use crate::auth::error::AuthFailure;
use crate::auth::verifier::IssuerRegistry;

/// JWT requirement attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequirement {
    /// Issuer whose tokens the route trusts.
    pub issuer: String,
    /// Accepted audiences; empty means any audience.
    pub audiences: BTreeSet<String>,
}

impl AuthRequirement {
    pub fn new<I, S>(issuer: impl Into<String>, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuer: issuer.into(),
            audiences: audiences.into_iter().map(Into::into).collect(),
        }
    }

    /// True if at least one token audience is accepted, or no restriction applies.
    pub fn allows_audiences(&self, audiences: &[String]) -> bool {
        self.audiences.is_empty() || audiences.iter().any(|aud| self.audiences.contains(aud))
    }
}

/// Validates bearer tokens against a route requirement.
///
/// Holds only read-only state; one instance serves every request.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    issuers: IssuerRegistry,
    leeway_secs: u64,
}

impl JwtValidator {
    pub fn new(issuers: IssuerRegistry) -> Self {
        Self {
            issuers,
            leeway_secs: 60,
        }
    }

    /// Allowed clock skew when checking `exp` and `nbf`.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn issuers(&self) -> &IssuerRegistry {
        &self.issuers
    }

    /// Validate against the current wall clock.
    pub fn validate(
        &self,
        token: Option<&str>,
        requirement: Option<&AuthRequirement>,
    ) -> Result<ValidatedClaims, AuthFailure> {
        self.validate_at(token, requirement, jsonwebtoken::get_current_timestamp())
    }

    /// Validate with an explicit "now" in seconds since the Unix epoch.
    ///
    /// Checks run in a fixed order: presence, structure, issuer, signature,
    /// time window, audience. The first failing check decides the outcome.
    pub fn validate_at(
        &self,
        token: Option<&str>,
        requirement: Option<&AuthRequirement>,
        now: u64,
    ) -> Result<ValidatedClaims, AuthFailure> {
        let Some(requirement) = requirement else {
            return Ok(ValidatedClaims::default());
        };
        let token = token.ok_or(AuthFailure::JwtMissing)?;

        let parsed = ParsedToken::parse(token)?;

        let issuer = parsed
            .claims
            .issuer
            .as_deref()
            .filter(|iss| *iss == requirement.issuer)
            .ok_or(AuthFailure::IssuerNotConfigured)?;
        let verifier = self
            .issuers
            .get(issuer)
            .ok_or(AuthFailure::IssuerNotConfigured)?;

        if !verifier.verify(&parsed.header, parsed.signing_input, parsed.signature) {
            return Err(AuthFailure::JwtSignatureInvalid);
        }

        let now = now as f64;
        let leeway = self.leeway_secs as f64;
        if let Some(exp) = parsed.claims.expiry {
            if exp + leeway < now {
                return Err(AuthFailure::JwtExpired);
            }
        }
        if let Some(nbf) = parsed.claims.not_before {
            if nbf > now + leeway {
                return Err(AuthFailure::JwtNotYetValid);
            }
        }

        if !requirement.allows_audiences(&parsed.claims.audiences) {
            return Err(AuthFailure::AudienceNotAllowed);
        }

        let claims = parsed.claims;
        Ok(ValidatedClaims {
            issuer: requirement.issuer.clone(),
            audiences: claims.audiences,
            subject: claims.subject,
            raw: claims.raw,
        })
    }
}
