//! 私信仓储接口定义

use async_trait::async_trait;

use crate::entities::message::Message;
use crate::repositories::RepositoryResult;
use crate::value_objects::{MessageId, UserId};

/// 私信仓储接口。消息不可变，没有更新和删除。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化一条新消息
    async fn create(&self, message: Message) -> RepositoryResult<Message>;

    /// 根据ID查找消息
    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>>;

    /// 获取两个用户之间的消息历史，按写入顺序新的在前。
    /// `before` 给定时只返回该消息之前的页。
    async fn history(
        &self,
        user_a: UserId,
        user_b: UserId,
        limit: u32,
        before: Option<MessageId>,
    ) -> RepositoryResult<Vec<Message>>;
}
