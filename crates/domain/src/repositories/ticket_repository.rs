//! 客服工单仓储接口定义
//!
//! 认领与关闭是条件写：守卫在存储当前记录上求值，一次原子
//! 比较并交换。这保证并发认领时恰好一个客服成功，绝不依赖
//! 事件送达顺序做仲裁。

use async_trait::async_trait;

use crate::entities::support_ticket::{SupportMessage, SupportTicket};
use crate::repositories::RepositoryResult;
use crate::value_objects::{TicketId, Timestamp, UserId};

/// 客服工单仓储接口。
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// 持久化一张新工单。若发起人已有进行中的工单，
    /// 返回 `RepositoryError::Conflict`。
    async fn create(&self, ticket: SupportTicket) -> RepositoryResult<SupportTicket>;

    /// 根据ID查找工单
    async fn find_by_id(&self, id: TicketId) -> RepositoryResult<Option<SupportTicket>>;

    /// 查找发起人当前进行中（open/assigned）的工单
    async fn find_active_by_requester(
        &self,
        requester_id: UserId,
    ) -> RepositoryResult<Option<SupportTicket>>;

    /// 原子认领：仅当状态恰为 open 时写入 assigned 和认领人，
    /// 返回更新后的工单；守卫不满足（含工单不存在）返回 None。
    async fn claim(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
    ) -> RepositoryResult<Option<SupportTicket>>;

    /// 条件关闭：仅当状态为 assigned 且认领人匹配时写入 closed，
    /// 返回更新后的工单；守卫不满足返回 None。
    async fn close(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
        closed_at: Timestamp,
    ) -> RepositoryResult<Option<SupportTicket>>;

    /// 所有等待认领的工单，按创建时间排序。
    async fn list_open(&self) -> RepositoryResult<Vec<SupportTicket>>;

    /// 追加一条工单留言
    async fn append_message(&self, message: SupportMessage) -> RepositoryResult<SupportMessage>;

    /// 工单的全部留言，按时间正序。
    async fn list_messages(&self, ticket_id: TicketId) -> RepositoryResult<Vec<SupportMessage>>;
}
