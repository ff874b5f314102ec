//! 仓储实现公共部分

use domain::RepositoryError;

pub mod conversation_repository_impl;
pub mod message_repository_impl;
pub mod ticket_repository_impl;

pub use conversation_repository_impl::PgConversationRepository;
pub use message_repository_impl::PgMessageRepository;
pub use ticket_repository_impl::PgTicketRepository;

/// sqlx 错误到仓储错误的统一映射。
/// 唯一约束冲突是业务可见的 Conflict，外键失配按目标不存在处理，
/// 其余一律归为瞬时存储错误，交给调用方决定是否重试。
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::storage(err.to_string()),
    }
}
