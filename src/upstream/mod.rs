//! 上游 API 客户端
//!
//! - `prokerala`: client_credentials 授权换取 access token
//! - `together`: chat completion 请求的校验、规范化与转发

pub mod prokerala;
pub mod together;

/// 把 reqwest 错误归类为简短的名称，用于错误响应的 details
pub fn error_name(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_decode() {
        "decode"
    } else if err.is_body() {
        "body"
    } else if err.is_request() {
        "request"
    } else {
        "transport"
    }
}

/// 完整错误链，形如 `error sending request: connection refused`
pub fn error_chain(err: reqwest::Error) -> String {
    format!("{:#}", anyhow::Error::new(err))
}
