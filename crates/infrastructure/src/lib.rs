//! 基础设施层：可信存储的 PostgreSQL 实现
//!
//! 实现 domain 中定义的仓储接口。核心把存储当作幂等、强一致
//! 的后端；工单认领/关闭用条件 UPDATE 落成真正的比较并交换。

pub mod db;

pub use db::repositories::{PgConversationRepository, PgMessageRepository, PgTicketRepository};
pub use db::{create_pg_pool, DbPool};
