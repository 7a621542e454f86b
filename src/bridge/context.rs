//! Per-request context.
//!
//! # Responsibilities
//! - Record which protocol carried the request (tagged `Ingress`)
//! - Extract the bearer token and request id
//! - Carry query parameters, headers and the undecoded payload
//!
//! # Design Decisions
//! - Ingress-specific data lives only in the `Ingress` variant; everything
//!   downstream of construction is protocol-agnostic
//! - HTTP bodies stay raw bytes until the caller is authorized, so a
//!   malformed body never masks a routing or auth failure

use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method};
use serde_json::Value;
use tonic::metadata::MetadataMap;

use crate::resilience::timeouts::{parse_grpc_timeout, GRPC_TIMEOUT};
use crate::routing::{parse_query, PathVariables, QueryParams};

/// Header carrying the request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Query parameter accepted as a token source for HTTP callers.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Which protocol the request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingress {
    Grpc { method: String },
    Http { method: Method, path: String },
}

impl Ingress {
    pub fn protocol(&self) -> &'static str {
        match self {
            Ingress::Grpc { .. } => "grpc",
            Ingress::Http { .. } => "http",
        }
    }
}

/// Request payload as received.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A typed gRPC message, already decoded by the transport.
    Message(Value),
    /// An HTTP body; empty means no body.
    Bytes(Bytes),
}

/// Everything the pipeline knows about one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub ingress: Ingress,
    pub query_params: QueryParams,
    pub headers: HeaderMap,
    pub bearer_token: Option<String>,
    /// Filled in by the path matcher (HTTP only).
    pub path_variables: PathVariables,
    pub payload: Payload,
    /// Deadline requested by the caller, if any.
    pub deadline: Option<Duration>,
}

impl RequestContext {
    /// Context for a gRPC call. `method` may be bare or `/pkg.Service/Method`.
    pub fn grpc(method: impl Into<String>, metadata: MetadataMap, message: Value) -> Self {
        let headers = metadata.into_headers();
        let deadline = headers
            .get(GRPC_TIMEOUT)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout);

        Self {
            request_id: request_id(&headers),
            ingress: Ingress::Grpc {
                method: method.into(),
            },
            query_params: QueryParams::new(),
            bearer_token: bearer_token(&headers),
            headers,
            path_variables: PathVariables::new(),
            payload: Payload::Message(message),
            deadline,
        }
    }

    /// Context for an HTTP request. `query` is the raw query string.
    pub fn http(method: Method, path: impl Into<String>, query: Option<&str>, headers: HeaderMap, body: Bytes) -> Self {
        let query_params = query.map(parse_query).unwrap_or_default();
        let bearer_token = bearer_token(&headers).or_else(|| {
            if headers.contains_key(AUTHORIZATION) {
                return None;
            }
            query_params
                .get(ACCESS_TOKEN_PARAM)
                .and_then(|values| values.first())
                .filter(|token| !token.is_empty())
                .cloned()
        });

        Self {
            request_id: request_id(&headers),
            ingress: Ingress::Http {
                method,
                path: path.into(),
            },
            query_params,
            bearer_token,
            headers,
            path_variables: PathVariables::new(),
            payload: Payload::Bytes(body),
            deadline: None,
        }
    }

    pub fn protocol(&self) -> &'static str {
        self.ingress.protocol()
    }
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// Any other scheme, or an empty token, counts as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
