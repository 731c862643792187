/// Chat Relay - Server
///
/// 聊天广播中继服务，在 /ws/chat 上接受 WebSocket 连接并向其他连接转发消息，
/// 另外提供会员认证、支付、博客和运营统计接口

mod api;
mod app_state;
mod auth;
mod config;
mod db;
mod metrics;
mod services;
mod ws;

use axum::{
    routing::get,
    Router,
};
use common::constants::CHAT_WS_PATH;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use crate::{
    app_state::AppState,
    auth::SessionManager,
    metrics::RelayMetrics,
    services::ChatNotifier,
    ws::ChatRelay,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let cfg = config::Config::from_env()?;

    // 初始化日志，RUST_LOG 优先于 LOG_LEVEL
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动 Chat Relay Server...");
    info!("✅ 配置加载成功");

    // 连接数据库
    let sea_db = db::establish_connection(&cfg.database_url).await?;
    db::ensure_schema(&sea_db).await?;
    info!("✅ 数据库初始化成功");

    // 初始化指标
    let metrics = RelayMetrics::new()?;

    // 启动广播中继
    let relay = ChatRelay::spawn(cfg.relay.clone(), metrics.clone());
    info!("✅ 聊天中继初始化成功");

    // 启动存活扫描
    relay.start_sweeper(cfg.relay.sweep_interval);
    info!("✅ 存活扫描任务已启动（每 {} 秒）", cfg.relay.sweep_interval.as_secs());

    // 登录会话
    let sessions = SessionManager::new(&cfg.jwt_secret, cfg.auth.session_ttl);

    // 聊天邮件通知
    let notifier = match &cfg.smtp {
        Some(smtp) => ChatNotifier::from_config(smtp)?,
        None => {
            info!("未配置 ADMIN_EMAIL/SMTP_USER，聊天邮件通知关闭");
            ChatNotifier::disabled()
        }
    };

    // 创建应用状态
    let app_state = AppState::new(sea_db, relay, metrics, sessions, cfg.auth.clone())
        .with_notifier(notifier);

    // 构建应用路由
    let app = build_router(app_state);

    // 启动服务器
    let addr: SocketAddr = cfg.listen_addr().parse()?;
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 服务器已停止");
    Ok(())
}

/// 构建路由
pub(crate) fn build_router(app_state: AppState) -> Router {
    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(api::chat::metrics_handler))
        .route(CHAT_WS_PATH, get(ws::handle_chat_websocket))
        .nest("/api", api::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root_handler() -> &'static str {
    "Chat Relay Server v1"
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听退出信号失败: {}", e);
        std::future::pending::<()>().await;
    }
}
