//! 错误类型
//!
//! Handler 内的所有失败都归入 [`ProxyError`]，并渲染为至少包含 `error` 和 `message` 的 JSON 响应

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    /// 凭据缺失或无效
    #[error("{summary}: {message}")]
    Configuration {
        summary: &'static str,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 在调用上游之前基于大小估算拒绝
    #[error("Request too large: ~{estimated_tokens} tokens exceeds {limit}")]
    RequestTooLarge { estimated_tokens: usize, limit: usize },

    /// 请求体超过读取上限，无需解析即可判定过大
    #[error("Request body exceeds {limit_bytes} bytes")]
    BodyTooLarge { limit_bytes: usize },

    /// 超过单次请求的整体截止时间
    #[error("Invocation exceeded {limit_ms}ms")]
    InvocationTimeout { limit_ms: u64 },

    #[error("Upstream timed out after {upstream_ms}ms")]
    UpstreamTimeout { elapsed_ms: u64, upstream_ms: u64 },

    /// 上游返回了非 2xx 状态
    #[error("Upstream returned HTTP {status}: {message}")]
    UpstreamStatus {
        status: StatusCode,
        error: Value,
        message: String,
    },

    /// 没有拿到上游响应（网络、TLS、解码失败等）
    #[error("Upstream request failed ({name}): {cause}")]
    Upstream {
        name: &'static str,
        code: Option<u16>,
        cause: String,
    },

    #[error("Failed to authenticate with Prokerala API: {0}")]
    Authentication(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::InvocationTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UpstreamStatus { status, .. } => *status,
            ProxyError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Authentication(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 错误响应体
    ///
    /// `production` 为 true 时不暴露底层错误链
    pub fn to_body(&self, production: bool) -> Value {
        match self {
            ProxyError::MethodNotAllowed(method) => json!({
                "error": "Method not allowed",
                "message": format!("{} is not supported on this endpoint", method),
            }),
            ProxyError::Configuration { summary, message } => json!({
                "error": summary,
                "message": message,
            }),
            ProxyError::InvalidRequest(message) => json!({
                "error": "Invalid request",
                "message": message,
            }),
            ProxyError::RequestTooLarge {
                estimated_tokens,
                limit,
            } => json!({
                "error": "Request too large",
                "message": format!(
                    "Estimated {} tokens exceeds the limit of {}. Shorten the conversation and retry.",
                    estimated_tokens, limit
                ),
                "estimatedTokens": estimated_tokens,
                "limit": limit,
            }),
            ProxyError::BodyTooLarge { limit_bytes } => json!({
                "error": "Request too large",
                "message": format!(
                    "Request body exceeds {} bytes. Shorten the conversation and retry.",
                    limit_bytes
                ),
                "limitBytes": limit_bytes,
            }),
            ProxyError::InvocationTimeout { limit_ms } => json!({
                "error": "Invocation timeout",
                "message": "The request did not complete before the invocation deadline",
                "code": "504",
                "limitMs": limit_ms,
            }),
            ProxyError::UpstreamTimeout {
                elapsed_ms,
                upstream_ms,
            } => json!({
                "error": "Upstream timeout",
                "message": "The chat completion service did not respond in time",
                "code": "504",
                "elapsedMs": elapsed_ms,
                "upstreamMs": upstream_ms,
            }),
            ProxyError::UpstreamStatus { error, message, .. } => json!({
                "error": error,
                "message": message,
            }),
            ProxyError::Upstream { name, code, cause } => {
                let mut details = json!({ "name": name, "code": code });
                if !production {
                    details["cause"] = json!(cause);
                }
                json!({
                    "error": "Internal server error",
                    "message": "Failed to reach the chat completion service",
                    "details": details,
                })
            }
            ProxyError::Authentication(message) => json!({
                "error": "Failed to authenticate with Prokerala API",
                "message": message,
            }),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body(true))).into_response()
    }
}
