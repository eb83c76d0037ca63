//! Request-lifecycle tests for the chat endpoint.
//!
//! The router runs in-process against a scripted provider and a memory
//! store, so no network or database is needed.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chat_service::services::providers::mock::MockTextProvider;
use chat_service::services::providers::ProviderError;
use common::{body_bytes, body_json, TestApp};

const CREDENTIAL_MESSAGE: &str = "Invalid Gemini API key. Check your configuration.";
const GENERATION_MESSAGE: &str = "Failed to get a response from Gemini.";

#[tokio::test]
async fn post_prompt_returns_reply() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there")).build();

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, serde_json::json!({ "reply": "Hi there" }));
    assert_eq!(app.provider.call_count(), 1);
    assert_eq!(app.provider.history_lens(), vec![0]);
}

#[tokio::test]
async fn chat_alias_route_behaves_the_same() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there")).build();

    let response = app.post_json("/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reply"], "Hi there");
}

#[tokio::test]
async fn each_request_starts_with_empty_history() {
    let app = TestApp::builder(MockTextProvider::replying("ok")).build();

    app.post_json("/api/chat", r#"{"prompt":"first"}"#).await;
    app.post_json("/api/chat", r#"{"prompt":"second"}"#).await;

    assert_eq!(app.provider.history_lens(), vec![0, 0]);
}

#[tokio::test]
async fn non_post_methods_are_rejected_without_side_effects() {
    let app = TestApp::builder(MockTextProvider::replying("unused"))
        .with_persistence()
        .build();

    for method in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
        let response = app.call(method.clone(), "/api/chat").await;

        assert_eq!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED,
            "method {}",
            method
        );
        assert_eq!(response.headers()[header::ALLOW], "POST, OPTIONS");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Method not allowed.");
    }

    assert_eq!(app.provider.call_count(), 0);
    assert_eq!(app.connector().connect_count(), 0);
}

#[tokio::test]
async fn options_short_circuits_with_cors_headers() {
    let app = TestApp::builder(MockTextProvider::replying("unused"))
        .with_persistence()
        .build();

    let response = app.call(Method::OPTIONS, "/api/chat").await;

    assert!(response.status().is_success());
    let headers = response.headers().clone();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    assert!(body_bytes(response).await.is_empty());

    assert_eq!(app.provider.call_count(), 0);
    assert_eq!(app.connector().connect_count(), 0);
}

#[tokio::test]
async fn browser_preflight_is_answered() {
    let app = TestApp::builder(MockTextProvider::replying("unused")).build();

    let response = app
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/chat")
                .header(header::ORIGIN, "https://example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(response.status().is_success());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn options_is_not_allowed_when_cors_disabled() {
    let app = TestApp::builder(MockTextProvider::replying("unused"))
        .without_cors()
        .build();

    let response = app.call(Method::OPTIONS, "/api/chat").await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "POST");
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn cors_origin_header_is_attached_to_replies() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there")).build();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/chat")
                .header(header::ORIGIN, "https://example.com")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"Hello"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn missing_or_empty_prompt_is_bad_request() {
    let app = TestApp::builder(MockTextProvider::replying("unused"))
        .with_persistence()
        .build();

    for body in [
        "{}",
        r#"{"prompt":""}"#,
        r#"{"prompt":null}"#,
        r#"{"prompt":42}"#,
        "not json",
        "",
    ] {
        let response = app.post_json("/api/chat", body).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(
            body_json(response).await["error"],
            "Prompt not found in request."
        );
    }

    assert_eq!(app.provider.call_count(), 0);
    assert_eq!(app.connector().connect_count(), 0);
}

#[tokio::test]
async fn post_without_json_content_type_is_bad_request() {
    let app = TestApp::builder(MockTextProvider::replying("unused")).build();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/chat")
                .body(Body::from(r#"{"prompt":"Hello"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn successful_exchange_is_recorded_once() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there"))
        .with_persistence()
        .build();

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reply"], "Hi there");

    let records = app.connector().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prompt, "Hello");
    assert_eq!(records[0].reply, "Hi there");
}

#[tokio::test]
async fn connection_is_reused_across_requests() {
    let app = TestApp::builder(MockTextProvider::replying("ok"))
        .with_persistence()
        .build();

    for _ in 0..3 {
        let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.connector().connect_count(), 1);
    assert_eq!(app.connector().records().len(), 3);
}

#[tokio::test]
async fn stale_connection_is_reestablished() {
    let app = TestApp::builder(MockTextProvider::replying("ok"))
        .with_persistence()
        .build();

    app.post_json("/api/chat", r#"{"prompt":"one"}"#).await;
    app.connector().last_store().unwrap().set_ready(false);
    let response = app.post_json("/api/chat", r#"{"prompt":"two"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.connector().connect_count(), 2);
    assert_eq!(app.connector().records().len(), 2);
}

#[tokio::test]
async fn invalid_api_key_message_maps_to_credential_error() {
    let app = TestApp::builder(MockTextProvider::failing(|| {
        ProviderError::ApiError(
            "[GoogleGenerativeAI Error]: API key not valid. Please pass a valid API key."
                .to_string(),
        )
    }))
    .build();

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], CREDENTIAL_MESSAGE);
}

#[tokio::test]
async fn structured_credential_error_maps_to_credential_error() {
    let app = TestApp::builder(MockTextProvider::failing(|| {
        ProviderError::InvalidCredential("API_KEY_INVALID".to_string())
    }))
    .build();

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], CREDENTIAL_MESSAGE);
}

#[tokio::test]
async fn other_provider_failure_is_generic_server_error() {
    let app = TestApp::builder(MockTextProvider::failing(|| {
        ProviderError::NetworkError("connection reset by peer".to_string())
    }))
    .with_persistence()
    .build();

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], GENERATION_MESSAGE);
    assert!(app.connector().records().is_empty());
}

#[tokio::test]
async fn connection_failure_aborts_before_generation() {
    let app = TestApp::builder(MockTextProvider::replying("unused"))
        .with_persistence()
        .build();
    app.connector().fail_connect(true);

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Failed to connect to the database."
    );
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn write_failure_discards_reply() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there"))
        .with_persistence()
        .build();
    app.connector().fail_writes(true);

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to save the chat exchange.");
    assert!(body.get("reply").is_none());
    assert_eq!(app.provider.call_count(), 1);
}

#[tokio::test]
async fn write_failure_can_still_return_reply() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there"))
        .with_persistence()
        .return_reply_on_write_failure()
        .build();
    app.connector().fail_writes(true);

    let response = app.post_json("/api/chat", r#"{"prompt":"Hello"}"#).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reply"], "Hi there");
    assert!(app.connector().records().is_empty());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::builder(MockTextProvider::replying("Hi there")).build();

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-request-id", "req-42")
                .body(Body::from(r#"{"prompt":"Hello"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.headers()["x-request-id"], "req-42");
}
