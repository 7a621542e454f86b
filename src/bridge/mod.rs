//! Request bridge subsystem.
//!
//! # Data Flow
//! ```text
//! gRPC call (method, metadata, message)      HTTP request (method, path, query, headers, body)
//!     → grpc.rs                                  → http.rs
//!               ↘                              ↙
//!                context.rs (RequestContext: tagged Ingress, bearer token, request id)
//!                    → pipeline.rs
//!                        1. resolve   (RouteTable / path matcher)
//!                        2. authorize (JwtValidator, operation's requirement)
//!                        3. transcode (body selector + path variables)
//!                        4. dispatch  (Dispatcher, under deadline)
//!               ↙                              ↘
//!     grpc.rs: Response<Value> | Status          http.rs: JSON 200 | JSON error
//! ```
//!
//! # Design Decisions
//! - Accept/reject is decided once, protocol-agnostically; only rendering differs
//! - gRPC status descriptions name the auth failure; HTTP says only 401
//! - Dropping the inbound future cancels the backend call

pub mod context;
pub mod grpc;
pub mod http;
pub mod pipeline;

pub use context::{bearer_token, Ingress, Payload, RequestContext, X_REQUEST_ID};
pub use grpc::{to_status, GrpcIngress};
pub use http::{bridge_handler, http_status, render_error, ErrorBody, HttpState};
pub use pipeline::{transcode, Bridge};
