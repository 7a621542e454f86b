//! JWT authorization subsystem.
//!
//! # Data Flow
//! ```text
//! bearer token (optional) + route AuthRequirement (optional)
//!     → claims.rs (split sections, decode header/payload, normalize aud)
//!     → verifier.rs (issuer → verifier lookup, signature check)
//!     → validator.rs (time window, audience intersection)
//!     → ValidatedClaims or AuthFailure
//! ```
//!
//! # Design Decisions
//! - The requirement belongs to the operation, never to the transport, so
//!   gRPC and HTTP callers get the same accept/reject decision
//! - Issuer keys are resolved once at load time; nothing is fetched per request
//! - Tokens are parsed fresh per request and never cached
//! - Failure kinds are distinct and stable; rendering decides how much to reveal

pub mod claims;
pub mod error;
pub mod validator;
pub mod verifier;

pub use claims::ValidatedClaims;
pub use error::{AuthFailure, MalformedReason};
pub use validator::{AuthRequirement, JwtValidator};
pub use verifier::{IssuerRegistry, JwksVerifier, KeyError, KeyVerifier, Verifier};
