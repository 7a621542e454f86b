//! Backend dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Bridge (route resolved, caller authorized)
//!     → DispatchRequest (operation name, path vars, query, JSON message)
//!     → Dispatcher::dispatch (may suspend on I/O)
//!     → JSON result or BusinessError (gRPC status code + message)
//! ```
//!
//! # Design Decisions
//! - The bridge only sees the trait; business logic lives behind it
//! - Messages are protocol-neutral JSON, identical for gRPC and HTTP callers
//! - Business errors carry a gRPC code; HTTP rendering maps it to a status

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tonic::Code;

use crate::routing::{PathVariables, QueryParams};

pub mod bookstore;

pub use bookstore::Bookstore;

/// Normalized request handed to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    /// Operation name from the route table.
    pub operation: String,
    pub path_variables: PathVariables,
    pub query_params: QueryParams,
    /// Request message after transcoding (always a JSON object for HTTP).
    pub message: Value,
}

/// Error produced by the backend itself, rendered but never reinterpreted.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} ({code:?})")]
pub struct BusinessError {
    pub code: Code,
    pub message: String,
}

impl BusinessError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }
}

/// Executes logical operations.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<Value, BusinessError>;
}
