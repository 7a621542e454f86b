//! Gateway error types.
//!
//! `GatewayError` covers startup and reload; anything here is fatal for the
//! configuration that produced it. `BridgeError` is the per-request outcome
//! taxonomy that the gRPC and HTTP renderers translate.

use thiserror::Error;

use crate::auth::{AuthFailure, KeyError};
use crate::backend::BusinessError;
use crate::config::ConfigError;
use crate::resilience::timeouts::DeadlineExceeded;
use crate::routing::RouteTableError;

/// Failure to build a gateway from configuration.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("issuer key material: {0}")]
    Keys(#[from] KeyError),

    #[error("route table: {0}")]
    Routes(#[from] RouteTableError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single request did not produce a backend result.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no operation matches the request")]
    RouteNotFound,

    #[error(transparent)]
    Unauthenticated(#[from] AuthFailure),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),

    #[error(transparent)]
    Business(#[from] BusinessError),
}

impl BridgeError {
    /// Stable outcome label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::RouteNotFound => "route_not_found",
            BridgeError::Unauthenticated(failure) => failure.kind(),
            BridgeError::InvalidRequest(_) => "invalid_request",
            BridgeError::PayloadTooLarge(_) => "payload_too_large",
            BridgeError::DeadlineExceeded(_) => "deadline_exceeded",
            BridgeError::Business(_) => "business_error",
        }
    }

    /// True for failures decided before the backend was reached.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BridgeError::RouteNotFound
                | BridgeError::Unauthenticated(_)
                | BridgeError::InvalidRequest(_)
                | BridgeError::PayloadTooLarge(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tonic::Code;

    #[test]
    fn test_kind_labels() {
        assert_eq!(BridgeError::RouteNotFound.kind(), "route_not_found");
        assert_eq!(
            BridgeError::from(AuthFailure::JwtMissing).kind(),
            AuthFailure::JwtMissing.kind()
        );
        assert_eq!(
            BridgeError::from(DeadlineExceeded(Duration::from_secs(1))).kind(),
            "deadline_exceeded"
        );
        let business = BridgeError::from(BusinessError::new(Code::NotFound, "gone"));
        assert_eq!(business.kind(), "business_error");
        assert!(!business.is_rejection());
        assert!(BridgeError::RouteNotFound.is_rejection());
    }

    #[test]
    fn test_auth_display_is_passed_through() {
        let err = BridgeError::from(AuthFailure::IssuerNotConfigured);
        assert_eq!(err.to_string(), "Jwt issuer is not configured");
    }
}
