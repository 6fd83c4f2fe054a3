//! Prokerala OAuth token 客户端

use axum::body::Bytes;
use http::{header, HeaderValue, StatusCode};
use reqwest::Client;

/// 上游 token 响应，原样透传给调用方
#[derive(Debug)]
pub struct TokenResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// 用 client credentials 换取 access token
///
/// 只发送一次请求，不重试；超时沿用共享客户端的默认值。
/// 只要上游有响应（无论状态码）就返回 `Ok`，由调用方决定如何透传。
pub async fn request_token(
    client: &Client,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenResponse, reqwest::Error> {
    let params = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];

    let response = client.post(token_url).form(&params).send().await?;

    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
    let body = response.bytes().await?;

    Ok(TokenResponse {
        status,
        content_type,
        body,
    })
}
