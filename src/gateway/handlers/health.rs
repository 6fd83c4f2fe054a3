//! 健康检查处理器

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::gateway::{handlers::start_trace, state::AppState};
use crate::trace::RequestTrace;
use crate::utils::rfc3339_now;

/// 路径中包含这些标记时视为健康检查
const HEALTH_MARKERS: &[&str] = &["health", "ping"];

pub fn is_health_path(path: &str) -> bool {
    HEALTH_MARKERS.iter().any(|marker| path.contains(marker))
}

/// 健康检查响应
///
/// 降级状态通过 `status` 字段表达，HTTP 状态码仍为 200
#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    timestamp: String,
    version: &'static str,
}

impl HealthReport {
    fn ok(message: &'static str) -> Self {
        Self {
            status: "ok",
            message: Some(message),
            error: None,
            timestamp: rfc3339_now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    fn degraded(error: &'static str) -> Self {
        Self {
            status: "error",
            message: None,
            error: Some(error),
            timestamp: rfc3339_now(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

fn build_report(config: &Config) -> Result<Value, serde_json::Error> {
    let report = match config.chat.api_key.as_deref() {
        None => HealthReport::degraded("API key not configured"),
        Some(key) if key.chars().count() < config.limits.min_api_key_len => {
            HealthReport::degraded("API key appears to be invalid (too short)")
        }
        Some(_) => HealthReport::ok("Chat proxy is configured"),
    };
    serde_json::to_value(report)
}

/// 执行健康检查
pub(crate) fn check(state: &AppState, trace: &RequestTrace) -> Response {
    match build_report(state.config()) {
        Ok(report) => {
            let status = report.get("status");
            let error = report.get("error");
            trace.info("health check", json!({ "status": status, "error": error }));
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => {
            trace.error("health check failed", json!({ "error": err.to_string() }));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "error": "Health check failed",
                    "message": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn handle_health(State(state): State<AppState>, request: Request) -> Response {
    let trace = start_trace(&state, &request);
    check(&state, &trace)
}
