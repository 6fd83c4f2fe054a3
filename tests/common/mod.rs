//! 集成测试公共工具

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use orrery::trace::RecordingObserver;
use orrery::{build_router, AppState, Config};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_CLIENT_ID: &str = "test-client-id";
pub const TEST_CLIENT_SECRET: &str = "test-client-secret";
pub const TEST_API_KEY: &str = "test-together-api-key-0123456789";
pub const TEST_MODEL: &str = "meta-llama/Llama-3-8b-chat-hf";

pub const CORS_HEADER_NAMES: [&str; 5] = [
    "access-control-allow-credentials",
    "access-control-allow-origin",
    "access-control-allow-methods",
    "access-control-allow-headers",
    "access-control-max-age",
];

/// 指向 mock server 的完整配置，凭据齐全
pub fn test_config(upstream: &str) -> Config {
    let mut config = Config::from_lookup(|_| None).expect("empty environment is valid");
    config.token.client_id = Some(TEST_CLIENT_ID.to_string());
    config.token.client_secret = Some(TEST_CLIENT_SECRET.to_string());
    config.token.token_url = format!("{}/token", upstream);
    config.chat.api_key = Some(TEST_API_KEY.to_string());
    config.chat.completions_url = format!("{}/v1/chat/completions", upstream);
    config.limits.upstream_timeout = Duration::from_millis(300);
    config
}

pub fn router(config: Config) -> Router {
    build_router(AppState::new(config))
}

pub fn router_with_observer(config: Config) -> (Router, Arc<RecordingObserver>) {
    let observer = Arc::new(RecordingObserver::new());
    let state = AppState::with_observer(config, observer.clone());
    (build_router(state), observer)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Vec<u8>,
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let raw = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body is readable")
        .to_vec();
    let body = if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&raw)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&raw).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
        raw,
    }
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn chat_body(content: &str) -> Value {
    serde_json::json!({
        "model": TEST_MODEL,
        "messages": [
            { "role": "system", "content": "You are an astrologer." },
            { "role": "user", "content": content }
        ]
    })
}

pub fn completion() -> Value {
    serde_json::json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "The sun in Leo shines boldly." },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20 }
    })
}

pub fn assert_cors(response: &TestResponse) {
    for name in CORS_HEADER_NAMES {
        assert!(
            response.headers.contains_key(name),
            "missing CORS header {name} (status {})",
            response.status
        );
    }
    assert_eq!(response.headers["access-control-allow-origin"], "*");
    assert_eq!(response.headers["access-control-allow-credentials"], "true");
}
