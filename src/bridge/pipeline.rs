//! Shared resolution, authorization and dispatch pipeline.
//!
//! # Responsibilities
//! - Resolve the operation (direct gRPC lookup or HTTP path matching)
//! - Enforce the operation's JWT requirement
//! - Build the dispatched message from body and path variables
//! - Call the backend under a deadline
//!
//! # Design Decisions
//! - One code path for both protocols; only context construction and
//!   rendering differ
//! - Routing and auth failures return before the dispatcher is touched
//! - The bridge is an immutable snapshot; reload builds a new one

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use crate::auth::{IssuerRegistry, JwtValidator, ValidatedClaims};
use crate::backend::{DispatchRequest, Dispatcher};
use crate::bridge::context::{Ingress, Payload, RequestContext};
use crate::config::validation::unconfigured_issuers;
use crate::config::GatewayConfig;
use crate::error::{BridgeError, GatewayError};
use crate::observability::metrics;
use crate::resilience::timeouts::{effective_deadline, with_deadline};
use crate::routing::{resolve_http, BodySelector, MatchInput, Operation, RouteTable};

/// Read-only request pipeline.
pub struct Bridge {
    routes: Arc<RouteTable>,
    validator: JwtValidator,
    dispatcher: Arc<dyn Dispatcher>,
    backend_timeout: Duration,
    max_body_size: usize,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("operations", &self.routes.operations().len())
            .field("issuers", &self.validator.issuers().len())
            .field("backend_timeout", &self.backend_timeout)
            .finish()
    }
}

impl Bridge {
    pub fn new(routes: Arc<RouteTable>, validator: JwtValidator, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            routes,
            validator,
            dispatcher,
            backend_timeout: Duration::from_secs(10),
            max_body_size: 2 * 1024 * 1024,
        }
    }

    /// Build route table and issuer registry from a validated config.
    pub fn from_config(config: &GatewayConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Self, GatewayError> {
        let routes = RouteTable::from_config(config)?;
        let issuers = IssuerRegistry::from_config(&config.issuers)?;
        for (operation, issuer) in unconfigured_issuers(config) {
            tracing::warn!(
                operation,
                issuer,
                "Route requires an issuer with no configured keys; every token will be rejected"
            );
        }
        let validator = JwtValidator::new(issuers).with_leeway(config.jwt.leeway_secs);

        Ok(Self::new(Arc::new(routes), validator, dispatcher)
            .with_backend_timeout(Duration::from_secs(config.timeouts.backend_secs))
            .with_max_body_size(config.security.max_body_size))
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Find the operation for a request, binding path variables for HTTP.
    pub fn resolve(&self, ctx: &mut RequestContext) -> Result<Arc<Operation>, BridgeError> {
        match &ctx.ingress {
            Ingress::Grpc { method } => self
                .routes
                .lookup_by_grpc_method(method)
                .ok_or(BridgeError::RouteNotFound),
            Ingress::Http { method, path } => {
                let input = MatchInput {
                    headers: &ctx.headers,
                    query: &ctx.query_params,
                };
                let resolved =
                    resolve_http(&self.routes, method, path, &input).ok_or(BridgeError::RouteNotFound)?;
                ctx.path_variables = resolved.path_variables;
                Ok(resolved.operation)
            }
        }
    }

    /// Check the caller's token against the operation's requirement.
    pub fn authorize(&self, operation: &Operation, ctx: &RequestContext) -> Result<ValidatedClaims, BridgeError> {
        self.validator
            .validate(ctx.bearer_token.as_deref(), operation.auth.as_ref())
            .map_err(BridgeError::from)
    }

    /// Run the full pipeline for one request.
    pub async fn handle(&self, mut ctx: RequestContext) -> Result<Value, BridgeError> {
        let start = Instant::now();
        let protocol = ctx.protocol();

        // 1. Resolve Operation
        let operation = match self.resolve(&mut ctx) {
            Ok(op) => op,
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    protocol,
                    ingress = ?ctx.ingress,
                    "No operation matched"
                );
                metrics::record_request(protocol, "none", err.kind(), start);
                return Err(err);
            }
        };

        let result = self.run(&operation, ctx, start).await;
        metrics::record_request(
            protocol,
            &operation.name,
            result.as_ref().map(|_| "ok").unwrap_or_else(|e| e.kind()),
            start,
        );
        result
    }

    async fn run(&self, operation: &Operation, ctx: RequestContext, start: Instant) -> Result<Value, BridgeError> {
        let protocol = ctx.protocol();

        // 2. Authorize
        let claims = match self.authorize(operation, &ctx) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    protocol,
                    operation = %operation.name,
                    failure = err.kind(),
                    "Authorization failed"
                );
                return Err(err);
            }
        };

        // 3. Transcode
        let message = transcode(operation, &ctx)?;

        // 4. Dispatch under deadline
        let deadline = effective_deadline(self.backend_timeout, ctx.deadline);
        let request = DispatchRequest {
            operation: operation.name.clone(),
            path_variables: ctx.path_variables,
            query_params: ctx.query_params,
            message,
        };
        let result = match with_deadline(deadline, self.dispatcher.dispatch(request)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(business)) => Err(BridgeError::Business(business)),
            Err(elapsed) => Err(BridgeError::DeadlineExceeded(elapsed)),
        };

        match &result {
            Ok(_) => tracing::debug!(
                request_id = %ctx.request_id,
                protocol,
                operation = %operation.name,
                subject = claims.subject.as_deref().unwrap_or(""),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            ),
            Err(err) => tracing::info!(
                request_id = %ctx.request_id,
                protocol,
                operation = %operation.name,
                outcome = err.kind(),
                error = %err,
                "Backend returned an error"
            ),
        }
        result
    }
}

/// Build the message handed to the dispatcher.
///
/// gRPC messages pass through unchanged. HTTP bodies are placed according to
/// the binding's body selector, then path variables are written in (as
/// strings, dotted names nesting), overriding body fields.
pub fn transcode(operation: &Operation, ctx: &RequestContext) -> Result<Value, BridgeError> {
    let body = match &ctx.payload {
        Payload::Message(Value::Null) => return Ok(Value::Object(Map::new())),
        Payload::Message(message) => return Ok(message.clone()),
        Payload::Bytes(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => None,
        Payload::Bytes(bytes) => Some(
            serde_json::from_slice::<Value>(bytes)
                .map_err(|e| BridgeError::InvalidRequest(format!("body is not valid JSON: {e}")))?,
        ),
    };

    let selector = operation.http.as_ref().and_then(|rule| rule.body.as_ref());
    let mut message = match (selector, body) {
        (Some(BodySelector::Whole), Some(Value::Object(map))) => map,
        (Some(BodySelector::Whole), Some(_)) => {
            return Err(BridgeError::InvalidRequest("body must be a JSON object".into()))
        }
        (Some(BodySelector::Field(field)), Some(value)) => {
            let mut map = Map::new();
            set_field(&mut map, field, value)?;
            map
        }
        _ => Map::new(),
    };

    for (name, value) in &ctx.path_variables {
        set_field(&mut message, name, Value::String(value.clone()))?;
    }
    Ok(Value::Object(message))
}

fn set_field(message: &mut Map<String, Value>, dotted: &str, value: Value) -> Result<(), BridgeError> {
    let mut target = message;
    let mut parts = dotted.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            target.insert(part.to_string(), value);
            return Ok(());
        }
        let next = target
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        target = match next {
            Value::Object(map) => map,
            _ => {
                return Err(BridgeError::InvalidRequest(format!(
                    "field `{part}` of `{dotted}` is not an object"
                )))
            }
        };
    }
    Ok(())
}
