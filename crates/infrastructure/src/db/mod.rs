//! 数据库连接与仓储实现

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub mod repositories;

pub type DbPool = Pool<Postgres>;

/// 创建 PostgreSQL 连接池。
pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    tracing::info!(max_connections, "postgres pool ready");
    Ok(pool)
}
