#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chat_gateway::config::ChatConfig;
use chat_gateway::services::store::GroupStore;
use chat_gateway::services::{MemoryStore, MockPushProvider, Stores};
use chat_gateway::startup::{build_router, AppState, Application};
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "https://blog.dhruvs.host";

/// Router wired to an in-memory store and a mock push provider, both kept
/// here so tests can seed and inspect them.
pub struct TestContext {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub push: Arc<MockPushProvider>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with(ChatConfig::default(), MockPushProvider::new(true))
    }

    pub fn with_push(push: MockPushProvider) -> Self {
        Self::with(ChatConfig::default(), push)
    }

    pub fn with_config(config: ChatConfig) -> Self {
        Self::with(config, MockPushProvider::new(true))
    }

    /// Memory-backed context whose group lookups go to `groups` instead.
    pub fn with_groups(groups: Arc<dyn GroupStore>) -> Self {
        Self::build(ChatConfig::default(), MockPushProvider::new(true), Some(groups))
    }

    fn with(config: ChatConfig, push: MockPushProvider) -> Self {
        Self::build(config, push, None)
    }

    fn build(
        config: ChatConfig,
        push: MockPushProvider,
        groups: Option<Arc<dyn GroupStore>>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let push = Arc::new(push);
        let mut stores = Stores::from_backend(store.clone());
        if let Some(groups) = groups {
            stores.groups = groups;
        }
        let state = AppState::new(config, stores, push.clone())
            .expect("Failed to build app state");

        Self {
            router: build_router(state),
            store,
            push,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let text = String::from_utf8_lossy(&bytes).to_string();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            text,
            json,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    pub json: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn json_request_from(origin: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ORIGIN, origin)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// A real server on a random port, for tests that go over TCP.
pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = ChatConfig {
            common: CoreConfig {
                port: 0,
                ..CoreConfig::default()
            },
            dev_mode: true,
            ..ChatConfig::default()
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp { address, port }
    }
}
