//! 领域错误定义
//!
//! 错误分类与对外协议一致：校验失败、状态冲突、资源不存在。
//! 存储层的瞬时错误在 `repositories` 模块单独定义。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 状态冲突的机器可读原因，会原样序列化进拒绝事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// 工单已被其他客服认领
    AlreadyAssigned,
    /// 工单已关闭（终态）
    TicketClosed,
    /// 客服必须先认领工单
    ClaimRequired,
    /// 操作者不是工单的认领人
    NotTicketAssignee,
}

impl ConflictReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictReason::AlreadyAssigned => "already_assigned",
            ConflictReason::TicketClosed => "ticket_closed",
            ConflictReason::ClaimRequired => "claim_required",
            ConflictReason::NotTicketAssignee => "not_ticket_assignee",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 载荷校验失败
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    /// 状态机守卫拒绝了本次转换
    #[error("state conflict: {reason}")]
    StateConflict { reason: ConflictReason },

    /// 资源不存在
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },
}

impl DomainError {
    /// 创建校验错误
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建状态冲突错误
    pub fn state_conflict(reason: ConflictReason) -> Self {
        Self::StateConflict { reason }
    }

    /// 创建资源不存在错误
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;
