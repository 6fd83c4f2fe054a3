//! Chat proxy 处理器

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde_json::{json, Value};
use std::error::Error as StdError;

use crate::error::ProxyError;
use crate::gateway::handlers::{health, start_trace};
use crate::gateway::state::AppState;
use crate::trace::RequestTrace;
use crate::upstream::together;
use crate::utils::{extract_model, redact};

/// 请求体读取上限
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// /api/chat 处理器
///
/// # 路由规则
///
/// 1. 路径包含 health / ping 时执行健康检查（不限方法）
/// 2. OPTIONS 直接返回 204 预检响应
/// 3. 其他非 POST 请求返回 405
///
/// CORS 头由中间件统一添加
pub async fn handle_chat(State(state): State<AppState>, request: Request) -> Response {
    let mut trace = start_trace(&state, &request);

    if health::is_health_path(request.uri().path()) {
        return health::check(&state, &trace);
    }

    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    if request.method() != Method::POST {
        let err = ProxyError::MethodNotAllowed(request.method().clone());
        return error_response(&state, &trace, err);
    }

    match complete(&state, &mut trace, request).await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => error_response(&state, &trace, err),
    }
}

/// 读取失败是否由请求体超过上限引起
fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

async fn read_json(request: Request) -> Result<Value, ProxyError> {
    let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            let inner = e.into_inner();
            if is_length_limit(inner.as_ref()) {
                ProxyError::BodyTooLarge {
                    limit_bytes: MAX_BODY_BYTES,
                }
            } else {
                ProxyError::InvalidRequest(format!("Failed to read request body: {}", inner))
            }
        })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ProxyError::InvalidRequest(format!("Request body is not valid JSON: {}", e)))
}

async fn complete(
    state: &AppState,
    trace: &mut RequestTrace,
    request: Request,
) -> Result<Value, ProxyError> {
    let config = state.config();
    let limits = &config.limits;

    let body = read_json(request).await?;
    trace.mark("parse");

    let inspection = together::inspect(&body, limits)?;
    trace.info(
        "chat request",
        json!({
            "model": inspection.model,
            "messages": inspection.message_count,
            "estimatedTokens": inspection.estimated_tokens,
            "requestedMaxTokens": inspection.requested_max_tokens,
        }),
    );
    if inspection.wants_large_output(limits) {
        trace.warn(
            "large output request, narrowing max_tokens",
            json!({
                "requestedMaxTokens": inspection.requested_max_tokens,
                "threshold": limits.max_requested_tokens,
                "cap": limits.max_output_tokens,
            }),
        );
    }
    trace.mark("validation");

    let api_key = config
        .chat
        .api_key
        .as_deref()
        .ok_or_else(|| ProxyError::Configuration {
            summary: "Server configuration error",
            message: "API key not configured".to_string(),
        })?;
    trace.debug("api key resolved", json!({ "keyPrefix": redact(api_key) }));
    trace.mark("config");

    let body = together::normalize(body, limits);
    trace.debug(
        "forwarding to upstream",
        json!({
            "url": config.chat.completions_url,
            "model": extract_model(&body),
            "maxTokens": body.get("max_tokens"),
            "temperature": body.get("temperature"),
            "timeoutMs": limits.upstream_timeout.as_millis() as u64,
        }),
    );

    let result = together::send_chat(
        state.client(),
        &config.chat.completions_url,
        api_key,
        &body,
        limits.upstream_timeout,
        trace,
    )
    .await;
    let upstream_ms = trace.mark("upstream");

    let mut response =
        result.map_err(|failure| failure.into_proxy_error(trace.elapsed_ms(), upstream_ms))?;

    trace.info(
        "chat completion",
        json!({ "upstreamMs": upstream_ms, "totalMs": trace.elapsed_ms() }),
    );

    if let Some(obj) = response.as_object_mut() {
        obj.insert("_debug".to_string(), trace.debug_info());
    }
    Ok(response)
}

/// 渲染错误响应，附带请求 ID 和阶段耗时
fn error_response(state: &AppState, trace: &RequestTrace, err: ProxyError) -> Response {
    trace.fail(err.to_string());

    let mut body = err.to_body(state.config().production);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("requestId".to_string(), json!(trace.id()));
        obj.insert("timings".to_string(), trace.timings());
        if matches!(err, ProxyError::UpstreamStatus { .. }) {
            obj.insert("_debug".to_string(), trace.debug_info());
        }
    }

    (err.status(), Json(body)).into_response()
}
