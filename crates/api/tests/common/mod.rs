//! Shared harness for the HTTP integration tests.
//!
//! Builds the production router over an in-memory store, a scripted token
//! endpoint and a manual clock, so tests control every upstream answer and
//! the passage of time.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::TimeZone;
use fleetbroker_api::config::ServerConfig;
use fleetbroker_api::router::build_app_router;
use fleetbroker_api::state::AppState;
use fleetbroker_core::clock::ManualClock;
use fleetbroker_core::memory::{MemoryStore, ScriptedTokenEndpoint};
use fleetbroker_core::types::Timestamp;
use fleetbroker_fleet::FleetConfig;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Application client configured as both partner and callback client.
pub const CLIENT_ID: &str = "app-client";
pub const CLIENT_SECRET: &str = "app-secret";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

pub fn test_fleet_config() -> FleetConfig {
    let mut config = FleetConfig::with_base_url("https://auth.example.com");
    config.client_id = CLIENT_ID.to_string();
    config.client_secret = CLIENT_SECRET.to_string();
    config
}

pub fn t0() -> Timestamp {
    chrono::Utc.with_ymd_and_hms(2025, 8, 21, 7, 47, 43).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub endpoint: Arc<ScriptedTokenEndpoint>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    /// A fresh router sharing this app's state. `oneshot` consumes it.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn at(&self, secs: i64) {
        self.clock.set(t0() + chrono::Duration::seconds(secs));
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let endpoint = Arc::new(ScriptedTokenEndpoint::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let config = test_config();

    let state = AppState::new(
        store.clone(),
        endpoint.clone(),
        clock.clone(),
        test_fleet_config(),
        config.clone(),
    );

    TestApp {
        router: build_app_router(state, &config),
        store,
        endpoint,
        clock,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::POST, uri, body).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, body).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register the callback client through the API.
pub async fn register_callback_client(test: &TestApp) {
    let response = post_json(
        test.app(),
        "/api/v1/authorize",
        serde_json::json!({
            "clientId": CLIENT_ID,
            "clientSecret": CLIENT_SECRET,
            "grantType": "authorization_code",
            "redirectURI": "https://app.example.com/callback",
        }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
}
