//! Gateway 应用层
//!
//! HTTP 服务器和请求处理

mod handlers;
pub mod middleware;
mod state;

pub use state::AppState;

use anyhow::{Context, Result};
use axum::{middleware as axum_middleware, routing::any, Router};
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::utils::redact;

pub async fn serve(config: Config) -> Result<()> {
    log_startup(&config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid listen address")?;
    let app = build_router(AppState::new(config));
    tracing::info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn log_startup(config: &Config) {
    match config.token.credentials() {
        Some((client_id, _)) => tracing::info!(
            client_id = %redact(client_id),
            token_url = %config.token.token_url,
            "token proxy configured"
        ),
        None => tracing::warn!("Prokerala credentials missing; /api/token will return 500"),
    }

    match config.chat.api_key.as_deref() {
        Some(key) => tracing::info!(
            key_prefix = %redact(key),
            completions_url = %config.chat.completions_url,
            "chat proxy configured"
        ),
        None => tracing::warn!("Together API key missing; /api/chat will return 500"),
    }

    if config.production {
        tracing::info!("Running in production mode");
    }
}

/// 构建路由
///
/// - `/api/token`: token proxy（方法校验在 handler 内完成）
/// - `/api/chat`、`/api/chat/*`: chat proxy 及其健康检查子路由，带 CORS 头
/// - `/health`: 同 chat proxy 的健康检查
pub fn build_router(state: AppState) -> Router {
    let deadline = axum_middleware::from_fn_with_state(
        state.config().limits.invocation_timeout,
        middleware::invocation_deadline,
    );

    // CORS 在截止时间外侧，超时响应也带 CORS 头
    let chat_routes = Router::new()
        .route("/api/chat", any(handlers::handle_chat))
        .route("/api/chat/{*rest}", any(handlers::handle_chat))
        .route("/health", any(handlers::handle_health))
        .route_layer(deadline.clone())
        .route_layer(axum_middleware::from_fn(middleware::cors_headers));

    let token_routes = Router::new()
        .route("/api/token", any(handlers::handle_token))
        .route_layer(deadline);

    Router::new()
        .merge(chat_routes)
        .merge(token_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_logger))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = ctrl_c => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
