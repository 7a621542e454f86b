//! API gateway: gRPC and HTTP/JSON ingress over one JWT-authorized route table.

pub mod auth;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use backend::{Bookstore, Dispatcher};
pub use bridge::{Bridge, GrpcIngress};
pub use config::schema::GatewayConfig;
pub use error::{BridgeError, GatewayError};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
