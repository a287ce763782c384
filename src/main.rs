use anyhow::Result;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rxui::config::get_config;
use rxui::migration::{init_sqlite, Migrator};
use rxui::traffic_limiter;

#[tokio::main]
async fn main() -> Result<()> {
    // 先读配置再初始化日志，log_dir 决定日志落到哪里
    let config = get_config().await;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    // 按天轮转文件日志或控制台日志
    if let Some(dir) = &config.log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, "rxui.log");
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(file_appender).with_ansi(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    info!("📋 rxui 启动");
    info!("💾 数据库: {}", config.db_path);
    info!("⏱️ 配额扫描间隔: {}s", config.sweep_interval_secs);

    // 初始化数据库并运行迁移
    let db = init_sqlite(&config.db_path).await?;
    Migrator::up(&db, None).await?;
    info!("✅ 数据库初始化完成");

    // 启动配额与有效期扫描
    start_policy_sweeper(db.clone(), config.sweep_interval_secs);

    info!("✅ 所有服务已启动，等待终止信号...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C 信号，正在关闭服务...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("收到 SIGTERM 信号，正在关闭服务...");
        }
    }

    Ok(())
}

/// 启动配额与有效期扫描后台任务
fn start_policy_sweeper(db: DatabaseConnection, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            match traffic_limiter::disable_invalid_inbounds(&db).await {
                Ok(count) if count > 0 => info!("已停用 {} 个失效入站", count),
                Ok(_) => {}
                Err(e) => tracing::error!("入站配额扫描失败: {}", e),
            }

            match traffic_limiter::disable_invalid_clients(&db).await {
                Ok(count) if count > 0 => info!("已停用 {} 个失效客户端", count),
                Ok(_) => {}
                Err(e) => tracing::error!("客户端配额扫描失败: {}", e),
            }
        }
    });
}
