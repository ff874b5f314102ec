//! 仓储接口定义
//!
//! 可信存储是外部组件，这里只定义访问契约。存储层错误与领域
//! 错误分开：`Storage` 表示瞬时 I/O 失败，按约定直接回给调用方
//! 由客户端决定是否重试，核心不做自动重试。

use thiserror::Error;

pub mod conversation_repository;
pub mod message_repository;
pub mod ticket_repository;

pub use conversation_repository::*;
pub use message_repository::*;
pub use ticket_repository::*;

/// 仓储层错误。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    /// 目标记录不存在
    #[error("record not found")]
    NotFound,

    /// 写入与现有记录冲突（如唯一约束）
    #[error("conflicting write")]
    Conflict,

    /// 存储暂时不可用
    #[error("storage unavailable: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 仓储结果类型
pub type RepositoryResult<T> = Result<T, RepositoryError>;
