//! Gateway server setup and configuration.
//!
//! # Responsibilities
//! - Build the bridge (route table, issuer registry, dispatcher) from config
//! - Create the Axum Router with the bridge as fallback handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Hand out the gRPC ingress sharing the same bridge
//! - Apply config reloads by swapping the whole bridge

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::backend::Dispatcher;
use crate::bridge::{bridge_handler, Bridge, GrpcIngress, HttpState};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// HTTP and gRPC front of the gateway.
pub struct GatewayServer {
    config: GatewayConfig,
    dispatcher: Arc<dyn Dispatcher>,
    bridge: Arc<ArcSwap<Bridge>>,
}

impl GatewayServer {
    /// Build a server from an already validated configuration.
    pub fn new(config: GatewayConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Self, GatewayError> {
        let bridge = Bridge::from_config(&config, Arc::clone(&dispatcher))?;
        tracing::info!(
            operations = bridge.routes().operations().len(),
            issuers = config.issuers.len(),
            service = config.service.name.as_deref().unwrap_or("-"),
            "Bridge initialized"
        );
        Ok(Self {
            config,
            dispatcher,
            bridge: Arc::new(ArcSwap::from_pointee(bridge)),
        })
    }

    /// Axum router serving every HTTP binding.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let state = HttpState::new(Arc::clone(&self.bridge), self.config.listener.max_connections);
        Router::new()
            .fallback(bridge_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs))),
            )
    }

    /// gRPC entry point backed by the same bridge as the router.
    pub fn grpc(&self) -> GrpcIngress {
        GrpcIngress::new(Arc::clone(&self.bridge))
    }

    /// Snapshot of the current bridge.
    pub fn bridge(&self) -> Arc<Bridge> {
        self.bridge.load_full()
    }

    /// Rebuild the bridge from a new configuration and swap it in.
    ///
    /// On error the running bridge is left untouched.
    pub fn reload(&self, config: &GatewayConfig) -> Result<(), GatewayError> {
        reload_bridge(&self.bridge, config, &self.dispatcher)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Config reloads (copy-and-swap)
        let bridge = Arc::clone(&self.bridge);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match reload_bridge(&bridge, &config, &dispatcher) {
                    Ok(()) => tracing::info!(
                        operations = config.operations.len(),
                        "Configuration reloaded"
                    ),
                    Err(e) => tracing::error!(error = %e, "Reload rejected; keeping current configuration"),
                }
            }
        });

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

fn reload_bridge(
    bridge: &ArcSwap<Bridge>,
    config: &GatewayConfig,
    dispatcher: &Arc<dyn Dispatcher>,
) -> Result<(), GatewayError> {
    let next = Bridge::from_config(config, Arc::clone(dispatcher))?;
    bridge.store(Arc::new(next));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Bookstore;
    use crate::config::parse_config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const ONE_ROUTE: &str = r#"
        [[operations]]
        name = "ListShelves"
        grpc_method = "ListShelves"
        [operations.http]
        method = "GET"
        path = "/v1/shelves"
    "#;

    async fn status(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_reload_swaps_routes() {
        let server = GatewayServer::new(GatewayConfig::default(), Arc::new(Bookstore::new())).unwrap();
        let router = server.router();
        assert_eq!(status(router.clone(), "/v1/shelves").await, StatusCode::NOT_FOUND);

        server.reload(&parse_config(ONE_ROUTE).unwrap()).unwrap();
        // Same router instance picks up the new snapshot.
        assert_eq!(status(router, "/v1/shelves").await, StatusCode::OK);
        assert!(server.grpc().call("ListShelves", tonic::Request::new(serde_json::json!({}))).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_current_bridge() {
        let server = GatewayServer::new(parse_config(ONE_ROUTE).unwrap(), Arc::new(Bookstore::new())).unwrap();
        let mut broken = parse_config(ONE_ROUTE).unwrap();
        broken.operations.push(broken.operations[0].clone());

        assert!(matches!(server.reload(&broken), Err(GatewayError::Routes(_))));
        assert_eq!(server.bridge().routes().operations().len(), 1);
    }
}
