//! gRPC ingress and status rendering.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use tonic::metadata::MetadataValue;
use tonic::{Request, Response, Status};

use crate::bridge::context::{RequestContext, X_REQUEST_ID};
use crate::bridge::pipeline::Bridge;
use crate::error::BridgeError;

/// Entry point for a gRPC transport.
///
/// Each call runs against the bridge snapshot current at call time.
#[derive(Debug, Clone)]
pub struct GrpcIngress {
    bridge: Arc<ArcSwap<Bridge>>,
}

impl GrpcIngress {
    pub fn new(bridge: Arc<ArcSwap<Bridge>>) -> Self {
        Self { bridge }
    }

    /// Handle one unary call. `method` is bare (`ListShelves`) or the full
    /// path (`/pkg.Service/ListShelves`).
    pub async fn call(&self, method: &str, request: Request<Value>) -> Result<Response<Value>, Status> {
        let bridge = self.bridge.load_full();
        let (metadata, _extensions, message) = request.into_parts();
        let ctx = RequestContext::grpc(method, metadata, message);
        let request_id = ctx.request_id.clone();

        let mut response = match bridge.handle(ctx).await {
            Ok(value) => Response::new(value),
            Err(err) => {
                let mut status = to_status(&err, method);
                insert_request_id(status.metadata_mut(), &request_id);
                return Err(status);
            }
        };
        insert_request_id(response.metadata_mut(), &request_id);
        Ok(response)
    }
}

/// Render a pipeline failure as a gRPC status.
///
/// Auth failures keep their sub-kind in the description.
pub fn to_status(err: &BridgeError, method: &str) -> Status {
    match err {
        BridgeError::RouteNotFound => Status::unimplemented(format!("Method does not exist: {method}")),
        BridgeError::Unauthenticated(failure) => Status::unauthenticated(failure.to_string()),
        BridgeError::InvalidRequest(message) => Status::invalid_argument(message.clone()),
        BridgeError::PayloadTooLarge(_) => Status::resource_exhausted(err.to_string()),
        BridgeError::DeadlineExceeded(_) => Status::deadline_exceeded("Deadline exceeded"),
        BridgeError::Business(business) => Status::new(business.code, business.message.clone()),
    }
}

fn insert_request_id(metadata: &mut tonic::metadata::MetadataMap, request_id: &str) {
    if let Ok(value) = MetadataValue::try_from(request_id) {
        metadata.insert(X_REQUEST_ID, value);
    }
}
