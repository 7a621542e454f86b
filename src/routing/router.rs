//! Route table: operation lookup by gRPC method or HTTP binding.
//!
//! # Responsibilities
//! - Store compiled operations
//! - Look up an operation by gRPC method name
//! - Hand out HTTP candidates, ordered most specific first
//! - Reject duplicate bindings at build time
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) gRPC lookup via HashMap
//! - HTTP candidates bucketed by (method, segment count), then scanned
//! - Explicit None rather than silent default

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::Method;
use thiserror::Error;

use crate::auth::AuthRequirement;
use crate::config::schema::{GatewayConfig, OperationConfig};
use crate::routing::matcher::{split_path, AndMatcher, HeaderMatcher, Matcher, QueryParamMatcher};
use crate::routing::template::{PathTemplate, TemplateError};

/// Startup-fatal problems in the operation table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("operation `{0}` is declared more than once")]
    DuplicateOperation(String),

    #[error("gRPC method `{method}` is bound by both `{first}` and `{second}`")]
    DuplicateGrpcMethod {
        method: String,
        first: String,
        second: String,
    },

    #[error("`{method} {path}` is bound by both `{first}` and `{second}`")]
    DuplicateHttpBinding {
        method: Method,
        path: String,
        first: String,
        second: String,
    },

    #[error("operation `{operation}`: {source}")]
    InvalidTemplate {
        operation: String,
        #[source]
        source: TemplateError,
    },

    #[error("operation `{operation}` has invalid http method `{method}`")]
    InvalidMethod { operation: String, method: String },

    #[error("operation `{operation}` has invalid header name `{name}`")]
    InvalidHeaderName { operation: String, name: String },
}

/// Where the HTTP JSON body lands in the dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySelector {
    /// The body is the whole message.
    Whole,
    /// The body is the value of this (possibly dotted) field.
    Field(String),
}

/// HTTP side of an operation.
#[derive(Debug)]
pub struct HttpRule {
    pub method: Method,
    pub template: PathTemplate,
    pub body: Option<BodySelector>,
    pub conditions: AndMatcher,
}

/// One logical backend capability.
#[derive(Debug)]
pub struct Operation {
    pub name: String,
    pub grpc_method: Option<String>,
    pub http: Option<HttpRule>,
    pub auth: Option<AuthRequirement>,
}

impl Operation {
    /// Compile an operation from its configuration entry.
    pub fn from_config(config: &OperationConfig) -> Result<Self, RouteTableError> {
        let http = match &config.http {
            Some(binding) => {
                let method = Method::from_bytes(binding.method.as_bytes()).map_err(|_| {
                    RouteTableError::InvalidMethod {
                        operation: config.name.clone(),
                        method: binding.method.clone(),
                    }
                })?;
                let template = PathTemplate::parse(&binding.path).map_err(|source| {
                    RouteTableError::InvalidTemplate {
                        operation: config.name.clone(),
                        source,
                    }
                })?;
                let body = match binding.body.as_deref() {
                    None | Some("") => None,
                    Some("*") => Some(BodySelector::Whole),
                    Some(field) => Some(BodySelector::Field(field.to_string())),
                };

                let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
                for header in &binding.headers {
                    let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| {
                        RouteTableError::InvalidHeaderName {
                            operation: config.name.clone(),
                            name: header.name.clone(),
                        }
                    })?;
                    matchers.push(Box::new(HeaderMatcher::new(name, header.value.clone())));
                }
                for param in &binding.query {
                    matchers.push(Box::new(QueryParamMatcher::new(
                        param.name.clone(),
                        param.value.clone(),
                    )));
                }

                Some(HttpRule {
                    method,
                    template,
                    body,
                    conditions: AndMatcher::new(matchers),
                })
            }
            None => None,
        };

        Ok(Self {
            name: config.name.clone(),
            grpc_method: config.grpc_method.clone(),
            http,
            auth: config
                .auth
                .as_ref()
                .map(|auth| AuthRequirement::new(auth.issuer.clone(), auth.audiences.iter().cloned())),
        })
    }
}

/// Read-only index of operations, built once at startup.
#[derive(Debug, Default)]
pub struct RouteTable {
    service: Option<String>,
    operations: Vec<Arc<Operation>>,
    grpc: HashMap<String, Arc<Operation>>,
    http: HashMap<(Method, usize), Vec<Arc<Operation>>>,
}

impl RouteTable {
    /// Build from the operations section of a configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, RouteTableError> {
        let operations = config
            .operations
            .iter()
            .map(Operation::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(config.service.name.clone(), operations)
    }

    /// Index operations, rejecting duplicate names and bindings.
    pub fn build(service: Option<String>, operations: Vec<Operation>) -> Result<Self, RouteTableError> {
        let mut table = Self {
            service,
            ..Self::default()
        };
        let mut names = HashSet::new();
        let mut bindings: HashMap<(Method, String, String), String> = HashMap::new();

        for operation in operations {
            if !names.insert(operation.name.clone()) {
                return Err(RouteTableError::DuplicateOperation(operation.name));
            }
            let operation = Arc::new(operation);

            if let Some(method) = &operation.grpc_method {
                if let Some(first) = table.grpc.get(method) {
                    return Err(RouteTableError::DuplicateGrpcMethod {
                        method: method.clone(),
                        first: first.name.clone(),
                        second: operation.name.clone(),
                    });
                }
                table.grpc.insert(method.clone(), Arc::clone(&operation));
            }

            if let Some(rule) = &operation.http {
                let key = (
                    rule.method.clone(),
                    rule.template.shape(),
                    rule.conditions.describe(),
                );
                if let Some(first) = bindings.get(&key) {
                    return Err(RouteTableError::DuplicateHttpBinding {
                        method: rule.method.clone(),
                        path: rule.template.to_string(),
                        first: first.clone(),
                        second: operation.name.clone(),
                    });
                }
                bindings.insert(key, operation.name.clone());
                table
                    .http
                    .entry((rule.method.clone(), rule.template.segments().len()))
                    .or_default()
                    .push(Arc::clone(&operation));
            }

            table.operations.push(operation);
        }

        for candidates in table.http.values_mut() {
            // Stable: equal specificity keeps declaration order.
            candidates.sort_by(|a, b| {
                let (a, b) = match (&a.http, &b.http) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return std::cmp::Ordering::Equal,
                };
                a.template
                    .specificity_cmp(&b.template)
                    .then_with(|| b.conditions.len().cmp(&a.conditions.len()))
            });
        }

        tracing::debug!(
            operations = table.operations.len(),
            grpc_methods = table.grpc.len(),
            "Route table built"
        );
        Ok(table)
    }

    /// Find the operation bound to a gRPC method.
    ///
    /// Accepts `Method`, `pkg.Service/Method` or `/pkg.Service/Method`. A
    /// qualified name must name the configured service, if one is set.
    pub fn lookup_by_grpc_method(&self, name: &str) -> Option<Arc<Operation>> {
        let method = match name.trim_start_matches('/').rsplit_once('/') {
            Some((service, method)) => {
                if let Some(expected) = &self.service {
                    if service != expected {
                        return None;
                    }
                }
                method
            }
            None => name,
        };
        self.grpc.get(method).cloned()
    }

    /// HTTP candidates for a method and concrete path, most specific first.
    ///
    /// Candidates share the path's segment count; the path matcher decides
    /// which one (if any) actually matches.
    pub fn lookup_by_http(&self, method: &Method, path: &str) -> &[Arc<Operation>] {
        self.candidates(method, split_path(path).len())
    }

    pub(crate) fn candidates(&self, method: &Method, segments: usize) -> &[Arc<Operation>] {
        self.http
            .get(&(method.clone(), segments))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }
}
