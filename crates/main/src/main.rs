//! 主应用程序入口
//!
//! 装配实时通信核心并启动 Axum 服务。

use std::sync::Arc;

use application::{
    ConnectionRegistry, ConversationService, EventRelay, SignalRelay, SupportTicketService,
    SystemClock,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, PgConversationRepository, PgMessageRepository, PgTicketRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );

    // 创建 PostgreSQL 连接池并运行迁移
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // 可信存储仓储
    let message_repo = Arc::new(PgMessageRepository::new(pg_pool.clone()));
    let conversation_repo = Arc::new(PgConversationRepository::new(pg_pool.clone()));
    let ticket_repo = Arc::new(PgTicketRepository::new(pg_pool));

    // 进程内组件：连接注册表与事件中继
    let clock: Arc<dyn application::Clock> = Arc::new(SystemClock);
    let registry = Arc::new(ConnectionRegistry::new(clock.clone()));
    let relay = Arc::new(EventRelay::new(registry.clone()));

    // 用例服务
    let conversations = Arc::new(ConversationService::new(
        message_repo,
        conversation_repo,
        registry.clone(),
        relay.clone(),
        clock.clone(),
    ));
    let tickets = Arc::new(SupportTicketService::new(
        ticket_repo,
        relay.clone(),
        clock,
    ));
    let signals = Arc::new(SignalRelay::new(relay.clone()));

    // JWT 校验（密钥与外部身份服务共享）
    let jwt = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(registry, relay, conversations, tickets, signals, jwt);

    // 启动 Web 服务器
    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("实时通信服务启动在 http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
