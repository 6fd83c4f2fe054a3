//! Gateway 中间件

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use tracing::Instrument;

use crate::error::ProxyError;
use crate::utils::generate_request_id;

/// 由请求日志中间件分配的请求 ID
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// chat proxy 每个响应都携带的 CORS 头
pub const CORS_HEADERS: [(&str, &str); 5] = [
    ("access-control-allow-credentials", "true"),
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "GET,OPTIONS,PATCH,DELETE,POST,PUT",
    ),
    (
        "access-control-allow-headers",
        "X-CSRF-Token, X-Requested-With, Accept, Accept-Version, Content-Length, Content-MD5, Content-Type, Date, X-Api-Version, Authorization",
    ),
    ("access-control-max-age", "86400"),
];

/// CORS 中间件
///
/// 放行所有来源，包括 handler 自己返回的错误响应
pub async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

/// 单次请求截止时间中间件
///
/// 超时后丢弃 handler，返回带请求 ID 的 JSON 504。
/// 挂在 CORS 中间件内侧，超时响应同样带 CORS 头。
pub async fn invocation_deadline(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|RequestId(id)| id.clone());

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            let limit_ms = limit.as_millis() as u64;
            tracing::warn!(limit_ms, "invocation deadline exceeded");
            let err = ProxyError::InvocationTimeout { limit_ms };

            let mut body = err.to_body(true);
            if let Some(obj) = body.as_object_mut() {
                obj.insert("requestId".to_string(), json!(request_id));
            }
            (err.status(), Json(body)).into_response()
        }
    }
}

/// 请求日志中间件
///
/// 为每个请求分配 ID，放入 extensions 供 handler 使用，并回写到响应头
pub async fn request_logger(mut request: Request, next: Next) -> Response {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "req",
        id = %request_id,
        %method,
        %path,
    );

    async move {
        let start = std::time::Instant::now();
        let mut response = next.run(request).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status().as_u16();

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        tracing::info!(status, latency_ms, "done");

        response
    }
    .instrument(span)
    .await
}
