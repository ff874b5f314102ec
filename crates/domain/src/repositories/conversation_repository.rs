//! 会话仓储接口定义
//!
//! 存储中的会话行是未读数的权威来源；内存缓存只能向它收敛。

use async_trait::async_trait;

use crate::entities::conversation::ConversationEntry;
use crate::entities::message::Message;
use crate::repositories::RepositoryResult;
use crate::value_objects::UserId;

/// 会话仓储接口。每行是 (观察者, 对端) 视角的摘要。
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 更新发送方视角的会话行：刷新最近消息，未读数不动。
    async fn record_for_sender(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
    ) -> RepositoryResult<ConversationEntry>;

    /// 更新接收方视角的会话行：刷新最近消息，`count_unread`
    /// 为 true 时未读数加一。返回写入后的权威会话行。
    async fn record_for_receiver(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
        count_unread: bool,
    ) -> RepositoryResult<ConversationEntry>;

    /// 清零 (观察者, 对端) 的未读数。行不存在时是空操作。
    async fn mark_read(&self, owner_id: UserId, partner_id: UserId) -> RepositoryResult<()>;

    /// 观察者的全部会话，按最近更新排序。
    async fn list_for_user(&self, owner_id: UserId) -> RepositoryResult<Vec<ConversationEntry>>;

    /// 读取 (观察者, 对端) 的权威未读数，行不存在视为 0。
    async fn unread_count(&self, owner_id: UserId, partner_id: UserId) -> RepositoryResult<u32>;
}
