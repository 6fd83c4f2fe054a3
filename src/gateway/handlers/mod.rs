//! HTTP 请求处理器

pub mod chat;
pub mod health;
pub mod token;

pub use chat::handle_chat;
pub use health::handle_health;
pub use token::handle_token;

use axum::extract::Request;

use crate::gateway::{middleware::RequestId, state::AppState};
use crate::trace::RequestTrace;

/// 为当前请求创建 trace，优先沿用中间件分配的请求 ID
fn start_trace(state: &AppState, request: &Request) -> RequestTrace {
    match request.extensions().get::<RequestId>() {
        Some(RequestId(id)) => RequestTrace::with_id(state.observer(), id.clone()),
        None => RequestTrace::start(state.observer()),
    }
}
