//! Token proxy 集成测试

mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn forwards_token_response_verbatim() {
    let server = MockServer::start().await;
    let token = json!({
        "access_token": "eyJ0eXAi.token",
        "token_type": "Bearer",
        "expires_in": 3600
    });

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains(&format!("client_id={}", TEST_CLIENT_ID)))
        .and(body_string_contains(&format!(
            "client_secret={}",
            TEST_CLIENT_SECRET
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(&token))
        .expect(1)
        .mount(&server)
        .await;

    let response = send(
        router(test_config(&server.uri())),
        request(Method::POST, "/api/token"),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, token);
    assert_eq!(response.headers["content-type"], "application/json");
}

#[tokio::test]
async fn rejects_non_post_methods() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for m in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS] {
        let response = send(
            router(test_config(&server.uri())),
            request(m.clone(), "/api/token"),
        )
        .await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED, "{m}");
        assert_eq!(response.body["error"], "Method not allowed");
        assert!(response.body["message"].is_string());
    }
}

#[tokio::test]
async fn missing_credentials_skip_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut without_secret = test_config(&server.uri());
    without_secret.token.client_secret = None;
    let mut without_id = test_config(&server.uri());
    without_id.token.client_id = None;

    for config in [without_secret, without_id] {
        let response = send(router(config), request(Method::POST, "/api/token")).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body["error"], "Missing API credentials");
        assert!(response.body["message"].is_string());
    }
}

#[tokio::test]
async fn upstream_error_status_and_body_pass_through() {
    let server = MockServer::start().await;
    let upstream_error = json!({
        "status": "error",
        "errors": [{ "title": "Authentication Error", "detail": "Invalid client credentials" }]
    });

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(&upstream_error))
        .expect(1)
        .mount(&server)
        .await;

    let response = send(
        router(test_config(&server.uri())),
        request(Method::POST, "/api/token"),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, upstream_error);
}

#[tokio::test]
async fn non_json_upstream_error_is_forwarded_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_raw("upstream maintenance", "text/plain"),
        )
        .mount(&server)
        .await;

    let response = send(
        router(test_config(&server.uri())),
        request(Method::POST, "/api/token"),
    )
    .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.raw, b"upstream maintenance");
    assert_eq!(response.headers["content-type"], "text/plain");
}

#[tokio::test]
async fn network_failure_maps_to_authentication_error() {
    // 端口 1 上没有监听，连接会立即失败
    let response = send(
        router(test_config("http://127.0.0.1:1")),
        request(Method::POST, "/api/token"),
    )
    .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body["error"],
        "Failed to authenticate with Prokerala API"
    );
    assert!(!response.body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn token_responses_have_no_cors_headers() {
    let server = MockServer::start().await;
    let response = send(
        router(test_config(&server.uri())),
        request(Method::GET, "/api/token"),
    )
    .await;
    assert!(!response.headers.contains_key("access-control-allow-origin"));
    assert!(response.headers.contains_key("x-request-id"));
}
