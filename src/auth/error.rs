//! JWT authorization failures.
//!
//! Each variant is a stable identity: gRPC callers see the `Display` text as
//! the status description, HTTP callers only ever see a generic 401.

use thiserror::Error;

/// Why a presented token could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Not exactly three dot-separated sections.
    Sections,
    /// Header section is not valid base64url JSON with a supported `alg`.
    Header,
    /// Payload section is not valid base64url JSON.
    Payload,
    /// Payload decodes but is not a JSON object.
    NotAnObject,
    /// A registered claim (`iss`, `aud`, `exp`, `nbf`, `sub`) has the wrong type.
    ClaimType,
}

/// Why a request failed authorization.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Jwt is missing")]
    JwtMissing,

    #[error("{}", malformed_message(.0))]
    JwtMalformed(MalformedReason),

    #[error("Jwt issuer is not configured")]
    IssuerNotConfigured,

    #[error("Jwt verification fails")]
    JwtSignatureInvalid,

    #[error("Jwt is expired")]
    JwtExpired,

    #[error("Jwt not yet valid")]
    JwtNotYetValid,

    #[error("Audiences in Jwt are not allowed")]
    AudienceNotAllowed,
}

impl AuthFailure {
    /// Short machine-friendly label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFailure::JwtMissing => "jwt_missing",
            AuthFailure::JwtMalformed(_) => "jwt_malformed",
            AuthFailure::IssuerNotConfigured => "issuer_not_configured",
            AuthFailure::JwtSignatureInvalid => "jwt_signature_invalid",
            AuthFailure::JwtExpired => "jwt_expired",
            AuthFailure::JwtNotYetValid => "jwt_not_yet_valid",
            AuthFailure::AudienceNotAllowed => "audience_not_allowed",
        }
    }
}

fn malformed_message(reason: &MalformedReason) -> &'static str {
    match reason {
        MalformedReason::Sections => {
            "Jwt is not in the form of Header.Payload.Signature with two dots and 3 sections"
        }
        MalformedReason::Header => "Jwt header is an invalid JSON",
        MalformedReason::Payload => "Jwt payload is an invalid JSON",
        MalformedReason::NotAnObject => "Jwt payload is not a JSON object",
        MalformedReason::ClaimType => "Jwt payload has a claim of the wrong type",
    }
}
