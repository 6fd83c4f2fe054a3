//! Token proxy 处理器

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::ProxyError;
use crate::gateway::{handlers::start_trace, state::AppState};
use crate::trace::RequestTrace;
use crate::upstream::{error_chain, prokerala};
use crate::utils::redact;

/// /api/token 处理器
///
/// 只接受 POST，用配置中的 client credentials 向 Prokerala 换取 access token。
/// 上游的响应（包括错误响应）原样透传。
pub async fn handle_token(State(state): State<AppState>, request: Request) -> Response {
    let mut trace = start_trace(&state, &request);
    let method = request.method().clone();

    match exchange(&state, &mut trace, &method).await {
        Ok(response) => response,
        Err(err) => {
            trace.fail(err.to_string());
            err.into_response()
        }
    }
}

async fn exchange(
    state: &AppState,
    trace: &mut RequestTrace,
    method: &Method,
) -> Result<Response, ProxyError> {
    if method != Method::POST {
        return Err(ProxyError::MethodNotAllowed(method.clone()));
    }

    let token = &state.config().token;
    let (client_id, client_secret) =
        token
            .credentials()
            .ok_or_else(|| ProxyError::Configuration {
                summary: "Missing API credentials",
                message: "PROKERALA_CLIENT_ID and PROKERALA_CLIENT_SECRET must be set".to_string(),
            })?;

    trace.debug(
        "requesting access token",
        json!({ "clientId": redact(client_id), "tokenUrl": token.token_url }),
    );

    let upstream =
        prokerala::request_token(state.client(), &token.token_url, client_id, client_secret)
            .await
            .map_err(|e| ProxyError::Authentication(error_chain(e)))?;

    let upstream_ms = trace.mark("upstream");

    if upstream.status.is_success() {
        trace.info("access token issued", json!({ "upstreamMs": upstream_ms }));
        return Ok((
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            upstream.body,
        )
            .into_response());
    }

    trace.warn(
        "token endpoint rejected request",
        json!({ "status": upstream.status.as_u16(), "upstreamMs": upstream_ms }),
    );

    let mut response = (upstream.status, upstream.body).into_response();
    let headers = response.headers_mut();
    match upstream.content_type {
        Some(content_type) => {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
    Ok(response)
}
