//! Orrery - 占星数据与 LLM 对话的轻量中继服务
//!
//! 两个互相独立的无状态 handler：
//!
//! - **Token proxy** (`/api/token`): 用配置的 client credentials 向 Prokerala 换取 OAuth access token
//! - **Chat proxy** (`/api/chat`): 校验、约束并转发 chat completion 请求到 Together，
//!   同时提供健康检查子路由
//!
//! 每个请求只调用一次上游，不重试；所有响应都是 JSON。

pub mod config;
pub mod error;
pub mod gateway;
pub mod trace;
pub mod upstream;
pub mod utils;

pub use config::{Config, Limits};
pub use error::ProxyError;
pub use gateway::{build_router, AppState};
