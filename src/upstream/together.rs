//! Together chat completion 客户端
//!
//! 转发前的处理分三步：
//! 1. [`inspect`] 校验请求结构并估算大小
//! 2. [`normalize`] 填充默认 temperature、收窄 max_tokens
//! 3. [`send_chat`] 带超时地发送一次请求

use http::StatusCode;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::Limits;
use crate::error::ProxyError;
use crate::trace::RequestTrace;
use crate::upstream::{error_chain, error_name};

/// 请求检查结果
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub model: String,
    pub message_count: usize,
    /// 消息内容字符数之和，作为 token 数的近似值
    pub estimated_tokens: usize,
    /// 调用方请求的 max_tokens（未指定或无效时为 None）
    pub requested_max_tokens: Option<u64>,
}

impl Inspection {
    /// 调用方请求的输出长度是否超过阈值
    pub fn wants_large_output(&self, limits: &Limits) -> bool {
        self.requested_max_tokens
            .is_some_and(|n| n > limits.max_requested_tokens)
    }
}

/// 单条消息内容的字符数
///
/// 字符串内容直接计数；数组内容累加每个 part 的 `text`；其他类型计 0
fn content_len(content: Option<&Value>) -> usize {
    match content {
        Some(Value::String(text)) => text.chars().count(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .map(|text| text.chars().count())
            .sum(),
        _ => 0,
    }
}

/// 估算 token 数：所有消息内容的字符数之和
pub fn estimate_tokens(messages: &[Value]) -> usize {
    messages
        .iter()
        .map(|message| content_len(message.get("content")))
        .sum()
}

fn requested_max_tokens(body: &Value) -> Option<u64> {
    body.get("max_tokens")
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 1.0)
        .map(|n| n as u64)
}

/// 校验请求结构，并在估算大小超过阈值时拒绝
pub fn inspect(body: &Value, limits: &Limits) -> Result<Inspection, ProxyError> {
    if !body.is_object() {
        return Err(ProxyError::InvalidRequest(
            "Request body must be a JSON object".to_string(),
        ));
    }

    let model = body
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ProxyError::InvalidRequest("`model` must be a non-empty string".to_string()))?;

    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| {
            ProxyError::InvalidRequest("`messages` must be a non-empty array".to_string())
        })?;

    let estimated_tokens = estimate_tokens(messages);
    if estimated_tokens > limits.max_estimated_tokens {
        return Err(ProxyError::RequestTooLarge {
            estimated_tokens,
            limit: limits.max_estimated_tokens,
        });
    }

    Ok(Inspection {
        model: model.to_string(),
        message_count: messages.len(),
        estimated_tokens,
        requested_max_tokens: requested_max_tokens(body),
    })
}

/// 填充默认值并收窄输出长度
///
/// - temperature 未指定时使用默认值
/// - max_tokens = min(请求值或默认值, 上限)
///
/// 其余字段原样保留
pub fn normalize(mut body: Value, limits: &Limits) -> Value {
    let max_tokens = requested_max_tokens(&body)
        .unwrap_or(limits.default_max_tokens)
        .min(limits.max_output_tokens);

    if let Some(obj) = body.as_object_mut() {
        obj.insert("max_tokens".to_string(), json!(max_tokens));

        let has_temperature = obj.get("temperature").is_some_and(|t| !t.is_null());
        if !has_temperature {
            obj.insert("temperature".to_string(), json!(limits.default_temperature));
        }
    }
    body
}

/// 上游调用失败
#[derive(Debug)]
pub enum UpstreamFailure {
    /// 超过请求超时
    Timeout,
    /// 上游返回非 2xx
    Status { status: StatusCode, body: Value },
    /// 没有拿到上游响应，或响应体无法解析
    Transport(reqwest::Error),
}

impl UpstreamFailure {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.to_string().to_lowercase().contains("timeout") {
            UpstreamFailure::Timeout
        } else {
            UpstreamFailure::Transport(err)
        }
    }

    /// 转换为对外的错误
    ///
    /// `elapsed_ms` 为请求总耗时，`upstream_ms` 为上游调用耗时
    pub fn into_proxy_error(self, elapsed_ms: u64, upstream_ms: u64) -> ProxyError {
        match self {
            UpstreamFailure::Timeout => ProxyError::UpstreamTimeout {
                elapsed_ms,
                upstream_ms,
            },
            UpstreamFailure::Status { status, body } => {
                let message = upstream_message(status, &body);
                let error = body
                    .get("error")
                    .filter(|e| !e.is_null())
                    .cloned()
                    .unwrap_or(body);
                ProxyError::UpstreamStatus {
                    status,
                    error,
                    message,
                }
            }
            UpstreamFailure::Transport(err) => ProxyError::Upstream {
                name: error_name(&err),
                code: err.status().map(|s| s.as_u16()),
                cause: error_chain(err),
            },
        }
    }
}

/// 从上游错误体中提取人类可读的消息
fn upstream_message(status: StatusCode, body: &Value) -> String {
    let error = body.get("error");
    error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str))
        .or_else(|| body.get("message").and_then(Value::as_str))
        .or_else(|| body.as_str())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Upstream request failed")
                .to_string()
        })
}

/// 读取上游错误响应体
///
/// 空响应体或读取失败时返回 `Null`，消息回退到状态码说明
async fn error_body(response: reqwest::Response, trace: &RequestTrace) -> Value {
    let status = response.status();
    match response.text().await {
        Ok(text) if text.trim().is_empty() => Value::Null,
        Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Err(err) => {
            trace.warn(
                "failed to read upstream error body",
                json!({ "status": status.as_u16(), "error": error_chain(err) }),
            );
            Value::Null
        }
    }
}

/// 发送 chat completion 请求
///
/// 只尝试一次；超时后丢弃正在进行的请求，不做重试
pub async fn send_chat(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &Value,
    timeout: Duration,
    trace: &RequestTrace,
) -> Result<Value, UpstreamFailure> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(UpstreamFailure::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(response, trace).await;
        return Err(UpstreamFailure::Status { status, body });
    }

    response
        .json::<Value>()
        .await
        .map_err(UpstreamFailure::from_reqwest)
}
