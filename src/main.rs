//! Orrery 命令行入口
//!
//! - `serve`: 启动中继服务器
//! - `test`: 向本地服务器发送测试请求

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use orrery::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Orrery CLI
#[derive(Parser)]
#[command(name = "orrery")]
#[command(about = "Astrology token and LLM chat relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 可用的命令
#[derive(Subcommand)]
enum Commands {
    /// 启动中继服务器
    Serve,
    /// 向本地服务器发送测试请求
    Test {
        /// 只请求健康检查
        #[arg(long)]
        health: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "orrery=info".into());
    let json = std::env::var("ORRERY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    if let Ok(dotenv_path) = std::env::var("ORRERY_ENV_FILE") {
        dotenvy::from_path(&dotenv_path).ok();
    } else {
        dotenvy::dotenv().ok();
    }

    init_tracing();

    // 配置只在启动时解析一次
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve => commands::serve_command(config).await,
        Commands::Test { health } => commands::test_command(config, health).await,
    }
}
