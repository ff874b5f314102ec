//! 私信实体定义
//!
//! 消息一经创建不可变，持久化由外部可信存储负责，
//! 这里只保证创建时的业务约束。

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{MessageBody, MessageId, Timestamp, UserId};

/// 用户间的一条私信。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 消息唯一ID
    pub id: MessageId,
    /// 发送者
    pub sender_id: UserId,
    /// 接收者
    pub receiver_id: UserId,
    /// 正文
    pub body: MessageBody,
    /// 创建时间
    pub created_at: Timestamp,
}

impl Message {
    /// 创建新消息。发送者不能给自己发消息。
    pub fn new(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        body: MessageBody,
        created_at: Timestamp,
    ) -> DomainResult<Self> {
        if sender_id == receiver_id {
            return Err(DomainError::validation(
                "receiver_id",
                "cannot message yourself",
            ));
        }

        Ok(Self {
            id,
            sender_id,
            receiver_id,
            body,
            created_at,
        })
    }

    /// 从存储行重建消息，跳过业务校验（入库前已校验过）。
    pub fn from_record(
        id: MessageId,
        sender_id: UserId,
        receiver_id: UserId,
        body: MessageBody,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender_id,
            receiver_id,
            body,
            created_at,
        }
    }
}
