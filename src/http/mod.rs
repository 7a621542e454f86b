//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (assign / keep request ID)
//!     → bridge::http (body limit, RequestContext, pipeline, rendering)
//!     → Response (x-request-id echoed)
//! ```

pub mod request;
pub mod server;

pub use server::GatewayServer;
