//! HTTP/JSON ingress and response rendering.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tonic::Code;

use crate::bridge::context::RequestContext;
use crate::bridge::pipeline::Bridge;
use crate::error::BridgeError;

/// Error body for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

/// Shared state of the HTTP ingress.
#[derive(Debug, Clone)]
pub struct HttpState {
    pub bridge: Arc<ArcSwap<Bridge>>,
    /// Bounds in-flight requests (`listener.max_connections`).
    pub in_flight: Arc<Semaphore>,
}

impl HttpState {
    pub fn new(bridge: Arc<ArcSwap<Bridge>>, max_in_flight: usize) -> Self {
        Self {
            bridge,
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
        }
    }
}

/// Axum handler routing every path through the bridge.
pub async fn bridge_handler(State(state): State<HttpState>, request: Request) -> Response {
    // Saturated: answer now instead of queueing.
    let _permit = match state.in_flight.try_acquire() {
        Ok(permit) => permit,
        Err(err) => {
            tracing::warn!(error = %err, "In-flight limit reached; rejecting request");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };
    let bridge = state.bridge.load_full();
    let (parts, body) = request.into_parts();

    // Body limit applies before routing; it is a transport concern.
    let limit = bridge.max_body_size();
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(_) => return render_error(&BridgeError::PayloadTooLarge(limit)),
    };

    let ctx = RequestContext::http(
        parts.method,
        parts.uri.path(),
        parts.uri.query(),
        parts.headers,
        body,
    );

    match bridge.handle(ctx).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => render_error(&err),
    }
}

/// Map a gRPC status code to the HTTP status used for business errors.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        // Client closed request (nginx convention).
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a pipeline failure as an HTTP response.
///
/// Auth failures collapse to a bare 401: the sub-kind is not exposed.
pub fn render_error(err: &BridgeError) -> Response {
    let (status, message) = match err {
        BridgeError::RouteNotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
        BridgeError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        BridgeError::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
        BridgeError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        BridgeError::DeadlineExceeded(_) => (StatusCode::GATEWAY_TIMEOUT, "Deadline exceeded".to_string()),
        BridgeError::Business(business) => (http_status(business.code), business.message.clone()),
    };

    let mut response = (
        status,
        Json(ErrorBody {
            code: status.as_u16(),
            message,
        }),
    )
        .into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}
