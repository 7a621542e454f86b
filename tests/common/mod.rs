//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use api_gateway::backend::{BusinessError, DispatchRequest, Dispatcher};
use api_gateway::config::schema::IssuerConfig;
use api_gateway::config::{parse_config, GatewayConfig};
use api_gateway::{Bookstore, GatewayServer};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ISSUER: &str = "api-proxy-testing@cloud.goog";
pub const SECRET: &str = "bookstore-test-secret";
pub const BOOKSTORE_TOML: &str = include_str!("../../config/bookstore.toml");

/// Bundled bookstore table plus an HS256 key for the test issuer.
pub fn bookstore_config() -> GatewayConfig {
    let mut config = parse_config(BOOKSTORE_TOML).expect("bundled config is valid");
    config.issuers.push(IssuerConfig {
        issuer: ISSUER.into(),
        secret: Some(SECRET.into()),
        public_key_pem: None,
        key_type: Default::default(),
        jwks: None,
        algorithms: vec!["HS256".into()],
    });
    config
}

pub fn now() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

pub fn sign(claims: Value, secret: &str) -> String {
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).expect("token encodes")
}

pub fn token_with(issuer: &str, aud: Value) -> String {
    sign(
        json!({"iss": issuer, "sub": "end-user", "aud": aud, "exp": now() + 3600}),
        SECRET,
    )
}

/// Trusted issuer, audience no route restricts to.
pub fn good_token() -> String {
    token_with(ISSUER, json!("bookstore_test_client.cloud.goog"))
}

pub fn single_aud_token() -> String {
    token_with(ISSUER, json!("ok_audience_1"))
}

/// One unrecognized audience next to one accepted by CreateBook.
pub fn multi_aud_token() -> String {
    token_with(ISSUER, json!(["bookstore_test_client.cloud.goog", "ok_audience_2"]))
}

pub fn admin_token() -> String {
    token_with(ISSUER, json!("admin.cloud.goog"))
}

pub fn bad_issuer_token() -> String {
    sign(
        json!({"iss": "unknown-issuer@cloud.goog", "aud": "ok_audience_1", "exp": now() + 3600}),
        SECRET,
    )
}

pub fn bad_signature_token() -> String {
    sign(
        json!({"iss": ISSUER, "aud": "ok_audience_1", "exp": now() + 3600}),
        "some-other-secret",
    )
}

/// Expired well beyond the default 60s leeway.
pub fn expired_token() -> String {
    sign(
        json!({"iss": ISSUER, "aud": "ok_audience_1", "exp": now() - 3600}),
        SECRET,
    )
}

/// Dispatcher that records operation names before delegating to the bookstore.
#[derive(Debug, Default)]
pub struct Recording {
    pub calls: Mutex<Vec<String>>,
}

impl Recording {
    pub fn operations(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for Recording {
    async fn dispatch(&self, request: DispatchRequest) -> Result<Value, BusinessError> {
        self.calls.lock().unwrap().push(request.operation.clone());
        Bookstore::new().dispatch(request).await
    }
}

pub fn server(config: GatewayConfig) -> (GatewayServer, Arc<Recording>) {
    let recording = Arc::new(Recording::default());
    let server = GatewayServer::new(config, recording.clone()).expect("server builds");
    (server, recording)
}

/// Issue one HTTP request through the router.
pub async fn http(
    server: &GatewayServer,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = server.router().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Issue one unary gRPC call through the gRPC ingress.
pub async fn grpc(
    server: &GatewayServer,
    method: &str,
    token: Option<&str>,
    message: Value,
) -> Result<Value, tonic::Status> {
    let mut request = tonic::Request::new(message);
    if let Some(token) = token {
        request
            .metadata_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());
    }
    server.grpc().call(method, request).await.map(tonic::Response::into_inner)
}
