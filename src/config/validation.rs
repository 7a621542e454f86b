//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that every issuer names exactly one key source
//! - Check that every operation is reachable through some binding
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Duplicate bindings are detected by the route table build, which owns
//!   the template grammar
//! - A route naming an unknown issuer is not an error here; it is reported
//!   per request as `IssuerNotConfigured`

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::routing::template::PathTemplate;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid listener.bind_address `{0}`")]
    BindAddress(String),

    #[error("listener.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("issuer `{0}` must set exactly one of secret, public_key_pem, jwks")]
    KeySource(String),

    #[error("issuer `{0}` is declared more than once")]
    DuplicateIssuer(String),

    #[error("issuer entry has an empty `issuer` field")]
    EmptyIssuer,

    #[error("operation #{0} has an empty name")]
    EmptyOperationName(usize),

    #[error("operation `{0}` has neither a grpc_method nor an http binding")]
    Unbound(String),

    #[error("operation `{operation}` has invalid http method `{method}`")]
    HttpMethod { operation: String, method: String },

    #[error("operation `{operation}`: {reason}")]
    Template { operation: String, reason: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("backend_secs"));
    }

    let mut issuers = HashSet::new();
    for issuer in &config.issuers {
        if issuer.issuer.is_empty() {
            errors.push(ValidationError::EmptyIssuer);
            continue;
        }
        if !issuers.insert(issuer.issuer.as_str()) {
            errors.push(ValidationError::DuplicateIssuer(issuer.issuer.clone()));
        }
        let sources = [
            issuer.secret.is_some(),
            issuer.public_key_pem.is_some(),
            issuer.jwks.is_some(),
        ];
        if sources.iter().filter(|set| **set).count() != 1 {
            errors.push(ValidationError::KeySource(issuer.issuer.clone()));
        }
    }

    for (index, op) in config.operations.iter().enumerate() {
        if op.name.is_empty() {
            errors.push(ValidationError::EmptyOperationName(index));
            continue;
        }
        if op.grpc_method.is_none() && op.http.is_none() {
            errors.push(ValidationError::Unbound(op.name.clone()));
        }
        if let Some(http) = &op.http {
            if Method::from_bytes(http.method.as_bytes()).is_err() {
                errors.push(ValidationError::HttpMethod {
                    operation: op.name.clone(),
                    method: http.method.clone(),
                });
            }
            if let Err(e) = PathTemplate::parse(&http.path) {
                errors.push(ValidationError::Template {
                    operation: op.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `(operation, issuer)` pairs whose required issuer has no `[[issuers]]` entry.
///
/// Not an error: such routes load and reject every token.
pub fn unconfigured_issuers(config: &GatewayConfig) -> Vec<(&str, &str)> {
    config
        .operations
        .iter()
        .filter_map(|op| op.auth.as_ref().map(|auth| (op.name.as_str(), auth.issuer.as_str())))
        .filter(|(_, issuer)| !config.issuers.iter().any(|i| i.issuer == *issuer))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{AuthConfig, HttpBindingConfig, IssuerConfig, OperationConfig};

    fn issuer(name: &str) -> IssuerConfig {
        IssuerConfig {
            issuer: name.into(),
            secret: Some("s3cret".into()),
            public_key_pem: None,
            key_type: Default::default(),
            jwks: None,
            algorithms: Vec::new(),
        }
    }

    fn op(name: &str, method: &str, path: &str) -> OperationConfig {
        OperationConfig {
            name: name.into(),
            grpc_method: None,
            http: Some(HttpBindingConfig {
                method: method.into(),
                path: path.into(),
                body: None,
                headers: Vec::new(),
                query: Vec::new(),
            }),
            auth: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.backend_secs = 0;
        let mut two_keys = issuer("a");
        two_keys.jwks = Some("{\"keys\":[]}".into());
        config.issuers.push(two_keys);
        config.issuers.push(issuer("b"));
        config.issuers.push(issuer("b"));
        config.operations.push(op("Bad", "GET", "v1/no-slash"));
        config.operations.push(OperationConfig {
            name: "Nowhere".into(),
            grpc_method: None,
            http: None,
            auth: None,
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::ZeroTimeout("backend_secs")));
        assert!(errors.contains(&ValidationError::KeySource("a".into())));
        assert!(errors.contains(&ValidationError::DuplicateIssuer("b".into())));
        assert!(errors.contains(&ValidationError::Unbound("Nowhere".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::Template { operation, .. } if operation == "Bad")));
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_rejects_invalid_http_method() {
        let mut config = GatewayConfig::default();
        config.operations.push(op("Weird", "GE T", "/v1/x"));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::HttpMethod {
                operation: "Weird".into(),
                method: "GE T".into()
            }]
        );
    }

    #[test]
    fn test_unknown_route_issuer_is_reported_not_rejected() {
        let mut config = GatewayConfig::default();
        config.issuers.push(issuer("known"));
        for (name, required) in [("A", "known"), ("B", "stranger"), ("C", "stranger")] {
            let mut operation = op(name, "GET", &format!("/v1/{name}"));
            operation.auth = Some(AuthConfig {
                issuer: required.into(),
                audiences: Vec::new(),
            });
            config.operations.push(operation);
        }
        config.operations.push(op("Open", "GET", "/v1/open"));

        assert!(validate_config(&config).is_ok());
        assert_eq!(unconfigured_issuers(&config), vec![("B", "stranger"), ("C", "stranger")]);
    }
}
