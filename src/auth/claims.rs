//! Token parsing and claim normalization.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::Header;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::error::{AuthFailure, MalformedReason};

/// `aud` may be a single string or a list in the wire encoding.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl From<Audience> for Vec<String> {
    fn from(aud: Audience) -> Self {
        match aud {
            Audience::One(a) => vec![a],
            Audience::Many(list) => list,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisteredClaims {
    iss: Option<String>,
    aud: Option<Audience>,
    sub: Option<String>,
    exp: Option<f64>,
    nbf: Option<f64>,
}

/// Claims read from a token before its signature has been checked.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub issuer: Option<String>,
    pub audiences: Vec<String>,
    pub subject: Option<String>,
    pub expiry: Option<f64>,
    pub not_before: Option<f64>,
    pub raw: Value,
}

/// A bearer token split into its sections.
#[derive(Debug)]
pub struct ParsedToken<'a> {
    pub header: Header,
    /// `base64url(header) "." base64url(payload)`, the bytes covered by the signature.
    pub signing_input: &'a str,
    pub signature: &'a str,
    pub claims: TokenClaims,
}

impl<'a> ParsedToken<'a> {
    /// Split and decode a compact JWS. Does not verify anything.
    pub fn parse(token: &'a str) -> Result<Self, AuthFailure> {
        let mut sections = token.split('.');
        let (header_b64, payload_b64, signature) =
            match (sections.next(), sections.next(), sections.next(), sections.next()) {
                (Some(h), Some(p), Some(s), None) => (h, p, s),
                _ => return Err(AuthFailure::JwtMalformed(MalformedReason::Sections)),
            };

        let header = jsonwebtoken::decode_header(token)
            .map_err(|_| AuthFailure::JwtMalformed(MalformedReason::Header))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthFailure::JwtMalformed(MalformedReason::Payload))?;
        let raw: Value = serde_json::from_slice(&payload)
            .map_err(|_| AuthFailure::JwtMalformed(MalformedReason::Payload))?;
        if !raw.is_object() {
            return Err(AuthFailure::JwtMalformed(MalformedReason::NotAnObject));
        }
        let registered: RegisteredClaims = serde_json::from_value(raw.clone())
            .map_err(|_| AuthFailure::JwtMalformed(MalformedReason::ClaimType))?;

        Ok(Self {
            header,
            signing_input: &token[..header_b64.len() + 1 + payload_b64.len()],
            signature,
            claims: TokenClaims {
                issuer: registered.iss,
                audiences: registered.aud.map(Vec::from).unwrap_or_default(),
                subject: registered.sub,
                expiry: registered.exp,
                not_before: registered.nbf,
                raw,
            },
        })
    }
}

/// Claims of a token that passed every check, or empty for anonymous routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatedClaims {
    pub issuer: String,
    pub audiences: Vec<String>,
    pub subject: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl ValidatedClaims {
    /// True when no token was required for the route.
    pub fn is_anonymous(&self) -> bool {
        self.issuer.is_empty()
    }
}
