//! 请求级可观测性
//!
//! Handler 不直接调用日志宏，而是通过注入的 [`Observer`] 记录事件，
//! 并用 [`RequestTrace`] 记录每个阶段的耗时。

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::utils::{generate_request_id, rfc3339_now};

/// 事件级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// 单条可观测事件
#[derive(Debug)]
pub struct TraceEvent<'a> {
    pub request_id: &'a str,
    pub level: Level,
    pub message: &'a str,
    pub fields: &'a Value,
}

/// 事件接收方
pub trait Observer: Send + Sync {
    fn event(&self, event: &TraceEvent<'_>);
}

/// 默认实现，转发到 tracing
#[derive(Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn event(&self, event: &TraceEvent<'_>) {
        let request_id = event.request_id;
        let fields = event.fields;
        match event.level {
            Level::Debug => tracing::debug!(request_id, %fields, "{}", event.message),
            Level::Info => tracing::info!(request_id, %fields, "{}", event.message),
            Level::Warn => tracing::warn!(request_id, %fields, "{}", event.message),
            Level::Error => tracing::error!(request_id, %fields, "{}", event.message),
        }
    }
}

/// 已记录的事件
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub request_id: String,
    pub level: Level,
    pub message: String,
    pub fields: Value,
}

/// 把事件保存在内存中，便于断言
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Observer for RecordingObserver {
    fn event(&self, event: &TraceEvent<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                request_id: event.request_id.to_string(),
                level: event.level,
                message: event.message.to_string(),
                fields: event.fields.clone(),
            });
        }
    }
}

/// 单次请求的记录：ID、到达时间和阶段耗时
///
/// 仅用于响应中的调试信息和日志，随响应一起丢弃
pub struct RequestTrace {
    id: String,
    received_at: String,
    start: Instant,
    checkpoint: Instant,
    phases: Vec<(&'static str, u64)>,
    observer: Arc<dyn Observer>,
}

impl RequestTrace {
    pub fn start(observer: Arc<dyn Observer>) -> Self {
        Self::with_id(observer, generate_request_id())
    }

    /// 使用已分配的请求 ID（通常来自请求日志中间件）
    pub fn with_id(observer: Arc<dyn Observer>, id: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            received_at: rfc3339_now(),
            start: now,
            checkpoint: now,
            phases: Vec::new(),
            observer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 结束当前阶段，返回该阶段耗时（毫秒）
    pub fn mark(&mut self, phase: &'static str) -> u64 {
        let now = Instant::now();
        let ms = now.duration_since(self.checkpoint).as_millis() as u64;
        self.checkpoint = now;
        self.phases.push((phase, ms));
        self.debug("phase complete", json!({ "phase": phase, "ms": ms }));
        ms
    }

    #[cfg(test)]
    pub fn phase_ms(&self, phase: &str) -> Option<u64> {
        self.phases
            .iter()
            .find(|(name, _)| *name == phase)
            .map(|(_, ms)| *ms)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.error("request failed", json!({ "error": error, "elapsedMs": self.elapsed_ms() }));
    }

    pub fn timings(&self) -> Value {
        let map: Map<String, Value> = self
            .phases
            .iter()
            .map(|(name, ms)| (name.to_string(), json!(ms)))
            .collect();
        Value::Object(map)
    }

    /// 响应中携带的 `_debug` 对象
    pub fn debug_info(&self) -> Value {
        json!({
            "requestId": self.id,
            "timestamp": self.received_at,
            "timings": self.timings(),
            "totalMs": self.elapsed_ms(),
        })
    }

    pub fn debug(&self, message: &str, fields: Value) {
        self.emit(Level::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: Value) {
        self.emit(Level::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Value) {
        self.emit(Level::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Value) {
        self.emit(Level::Error, message, fields);
    }

    fn emit(&self, level: Level, message: &str, fields: Value) {
        self.observer.event(&TraceEvent {
            request_id: &self.id,
            level,
            message,
            fields: &fields,
        });
    }
}
