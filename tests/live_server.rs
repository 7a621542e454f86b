//! Gateway served on a real socket.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_gateway::Shutdown;

mod common;
use common::*;

#[tokio::test]
async fn test_serves_over_tcp_and_shuts_down() {
    let (server, _) = server(bookstore_config());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (_updates_tx, updates) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, updates, shutdown.subscribe()));

    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/v1/shelves/125"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": "125", "theme": "Unknown Shelf"}));

    let response = client
        .get(format!("http://{addr}/v1/shelves"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(response.headers()["www-authenticate"], "Bearer");

    let response = client
        .get(format!("http://{addr}/v1/shelves"))
        .header("x-request-id", "req-42")
        .bearer_auth(single_aud_token())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after shutdown")
        .unwrap()
        .unwrap();
}
