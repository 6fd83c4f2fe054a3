use rand::{distr::Alphanumeric, Rng};
use reqwest::Client;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 共享 HTTP 客户端的默认超时
const CLIENT_TIMEOUT_SECS: u64 = 30;

/// 日志中允许出现的凭据前缀长度
const SECRET_PREFIX_LEN: usize = 4;

/// 是否禁用 TLS 验证（用于调试 mitmproxy 等场景）
pub fn should_disable_tls_verify() -> bool {
    std::env::var("ORRERY_DISABLE_TLS_VERIFY")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// 获取共享的 HTTP 客户端（token 交换与 chat 转发共用连接池）
static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

pub fn get_shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .user_agent(concat!("orrery/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(10);

        if should_disable_tls_verify() {
            tracing::warn!("TLS certificate verification is DISABLED - for debugging only!");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().expect("Failed to create HTTP client")
    })
}

/// 获取当前 Unix 时间戳（毫秒）
///
/// 如果系统时钟早于 UNIX_EPOCH（极端情况），返回 0
#[inline]
pub fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 当前时间的 RFC 3339 字符串
#[inline]
pub fn rfc3339_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// 生成请求 ID，格式为 `req_<毫秒时间戳>_<9 位小写字母数字>`
pub fn generate_request_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("req_{}_{}", unix_timestamp_ms(), suffix)
}

/// 凭据脱敏，仅保留前几个字符用于诊断
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(SECRET_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

/// 从请求体中提取 model 字段
///
/// 返回 model 字段的值，如果不存在则返回 "unknown"
#[inline]
pub fn extract_model(body: &serde_json::Value) -> String {
    body.get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}
