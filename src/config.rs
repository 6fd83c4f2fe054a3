//! 应用配置模块
//!
//! 进程启动时从环境变量一次性解析配置，包括：
//! - 服务器监听地址和端口
//! - Prokerala / Together 的凭据和上游地址
//! - 请求大小、输出长度、超时等阈值

use anyhow::{Context, Result};
use std::time::Duration;

/// Prokerala token 端点
pub const PROKERALA_TOKEN_URL: &str = "https://api.prokerala.com/token";
/// Together chat completion 端点
pub const TOGETHER_CHAT_URL: &str = "https://api.together.xyz/v1/chat/completions";

/// Together API key 的环境变量名，按顺序查找，第一个非空值生效
pub const API_KEY_VARS: &[&str] = &["TOGETHER_API_KEY", "TOGETHER_AI_API_KEY"];

/// 请求约束
///
/// 所有启发式数值集中在这里，方便测试和调整
#[derive(Debug, Clone)]
pub struct Limits {
    /// 消息内容字符总数上限（近似 token 数）
    pub max_estimated_tokens: usize,
    /// 调用方请求的 max_tokens 超过该值视为超大输出请求
    pub max_requested_tokens: u64,
    /// 实际转发的 max_tokens 上限
    pub max_output_tokens: u64,
    /// 调用方未指定 max_tokens 时的默认值
    pub default_max_tokens: u64,
    /// 调用方未指定 temperature 时的默认值
    pub default_temperature: f64,
    /// 上游 chat 请求超时，必须小于 invocation_timeout
    pub upstream_timeout: Duration,
    /// 单次请求的整体截止时间
    pub invocation_timeout: Duration,
    /// 健康检查认为合理的最短 API key 长度
    pub min_api_key_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_estimated_tokens: 10_000,
            max_requested_tokens: 1_000,
            max_output_tokens: 800,
            default_max_tokens: 500,
            default_temperature: 0.3,
            upstream_timeout: Duration::from_millis(8_000),
            invocation_timeout: Duration::from_secs(10),
            min_api_key_len: 20,
        }
    }
}

/// Token proxy 配置
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
}

impl TokenConfig {
    /// 两个凭据都存在时返回 (client_id, client_secret)
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((self.client_id.as_deref()?, self.client_secret.as_deref()?))
    }
}

/// Chat proxy 配置
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub completions_url: String,
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器监听地址（如 "0.0.0.0" 或 "127.0.0.1"）
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
    /// 生产模式下错误响应不携带错误链
    pub production: bool,
    pub token: TokenConfig,
    pub chat: ChatConfig,
    pub limits: Limits,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// # 环境变量
    ///
    /// - `ORRERY_HOST`: 服务器监听地址（默认: "0.0.0.0"）
    /// - `ORRERY_PORT`: 服务器监听端口（默认: 8080）
    /// - `ORRERY_ENV`: 为 `production` 时启用生产模式
    /// - `PROKERALA_CLIENT_ID` / `PROKERALA_CLIENT_SECRET`: token proxy 凭据
    /// - `TOGETHER_API_KEY` / `TOGETHER_AI_API_KEY`: chat proxy 凭据
    /// - `PROKERALA_TOKEN_URL` / `TOGETHER_CHAT_URL`: 覆盖上游地址
    ///
    /// 凭据缺失不会导致启动失败，而是在对应请求中返回配置错误
    ///
    /// # 错误
    ///
    /// - 如果 `ORRERY_PORT` 不是有效的端口号
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 使用任意查找函数解析配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = non_empty("ORRERY_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = non_empty("ORRERY_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("ORRERY_PORT must be a valid port number")?;

        let production = non_empty("ORRERY_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let token = TokenConfig {
            client_id: non_empty("PROKERALA_CLIENT_ID"),
            client_secret: non_empty("PROKERALA_CLIENT_SECRET"),
            token_url: non_empty("PROKERALA_TOKEN_URL")
                .unwrap_or_else(|| PROKERALA_TOKEN_URL.to_string()),
        };

        let chat = ChatConfig {
            api_key: API_KEY_VARS.iter().find_map(|name| non_empty(*name)),
            completions_url: non_empty("TOGETHER_CHAT_URL")
                .unwrap_or_else(|| TOGETHER_CHAT_URL.to_string()),
        };

        Ok(Self {
            host,
            port,
            production,
            token,
            chat,
            limits: Limits::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert!(!config.production);
        assert!(config.token.credentials().is_none());
        assert!(config.chat.api_key.is_none());
        assert_eq!(config.token.token_url, PROKERALA_TOKEN_URL);
        assert_eq!(config.chat.completions_url, TOGETHER_CHAT_URL);
    }

    #[test]
    fn first_non_empty_api_key_wins() {
        let config = Config::from_lookup(lookup(&[
            ("TOGETHER_API_KEY", "  "),
            ("TOGETHER_AI_API_KEY", "fallback-key"),
        ]))
        .unwrap();
        assert_eq!(config.chat.api_key.as_deref(), Some("fallback-key"));

        let config = Config::from_lookup(lookup(&[
            ("TOGETHER_API_KEY", "primary-key"),
            ("TOGETHER_AI_API_KEY", "fallback-key"),
        ]))
        .unwrap();
        assert_eq!(config.chat.api_key.as_deref(), Some("primary-key"));
    }

    #[test]
    fn credentials_require_both_values() {
        let config =
            Config::from_lookup(lookup(&[("PROKERALA_CLIENT_ID", "client")])).unwrap();
        assert!(config.token.credentials().is_none());

        let config = Config::from_lookup(lookup(&[
            ("PROKERALA_CLIENT_ID", "client"),
            ("PROKERALA_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.token.credentials(), Some(("client", "secret")));
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("ORRERY_PORT", "not-a-port")])).is_err());
    }

    #[test]
    fn production_mode_is_case_insensitive() {
        let config = Config::from_lookup(lookup(&[("ORRERY_ENV", "Production")])).unwrap();
        assert!(config.production);
    }

    #[test]
    fn upstream_timeout_stays_below_invocation_deadline() {
        let limits = Limits::default();
        assert!(limits.upstream_timeout < limits.invocation_timeout);
        assert!(limits.max_output_tokens < limits.max_requested_tokens);
    }
}
