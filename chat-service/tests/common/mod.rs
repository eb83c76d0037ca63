#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use chat_service::services::persistence::memory::MemoryConnector;
use chat_service::services::providers::mock::MockTextProvider;
use chat_service::services::{ChatService, ConnectionCache, WriteFailurePolicy};
use chat_service::startup::{build_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

/// Router wired to a scripted provider and, optionally, a memory store.
pub struct TestApp {
    pub router: Router,
    pub provider: Arc<MockTextProvider>,
    pub connector: Option<Arc<MemoryConnector>>,
}

pub struct TestAppBuilder {
    provider: MockTextProvider,
    persistence: bool,
    cors: bool,
    policy: WriteFailurePolicy,
}

impl TestApp {
    pub fn builder(provider: MockTextProvider) -> TestAppBuilder {
        TestAppBuilder {
            provider,
            persistence: false,
            cors: true,
            policy: WriteFailurePolicy::Fail,
        }
    }

    pub fn connector(&self) -> &MemoryConnector {
        self.connector
            .as_deref()
            .expect("test app built without persistence")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, path: &str, body: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn call(&self, method: Method, path: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

impl TestAppBuilder {
    pub fn with_persistence(mut self) -> Self {
        self.persistence = true;
        self
    }

    pub fn without_cors(mut self) -> Self {
        self.cors = false;
        self
    }

    pub fn return_reply_on_write_failure(mut self) -> Self {
        self.policy = WriteFailurePolicy::ReturnReply;
        self
    }

    pub fn build(self) -> TestApp {
        let provider = Arc::new(self.provider);
        let mut service =
            ChatService::new(provider.clone()).with_write_failure_policy(self.policy);

        let connector = if self.persistence {
            let connector = Arc::new(MemoryConnector::new());
            service =
                service.with_persistence(Arc::new(ConnectionCache::new(connector.clone())));
            Some(connector)
        } else {
            None
        };

        TestApp {
            router: build_router(AppState::new(service, self.cors)),
            provider,
            connector,
        }
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

pub async fn body_bytes(response: Response<Body>) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
}
