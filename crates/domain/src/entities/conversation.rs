//! 会话视图实体
//!
//! ConversationEntry 是某个观察者视角下与一个对端的会话摘要。
//! 它是派生缓存，未读数以可信存储里的值为准，缓存只能被
//! 权威值覆盖，不做合并。

use serde::{Deserialize, Serialize};

use crate::entities::message::Message;
use crate::value_objects::UserId;

/// 观察者视角下与某个对端的会话摘要。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// 对端用户
    pub partner_id: UserId,
    /// 最近一条消息
    pub last_message: Option<Message>,
    /// 未读条数，非负
    pub unread_count: u32,
}

impl ConversationEntry {
    pub fn new(partner_id: UserId) -> Self {
        Self {
            partner_id,
            last_message: None,
            unread_count: 0,
        }
    }

    /// 记录一条来自对端（或发往对端）的新消息。
    /// `count_unread` 为 false 时只更新最近消息，不累计未读
    /// （观察者正在查看该会话、或消息是自己发出的）。
    pub fn record_message(&mut self, message: Message, count_unread: bool) {
        self.last_message = Some(message);
        if count_unread {
            self.unread_count += 1;
        }
    }

    /// 观察者打开会话（拉取历史）时清零未读。
    pub fn mark_read(&mut self) {
        self.unread_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{MessageBody, MessageId};
    use chrono::Utc;
    use uuid::Uuid;

    fn message(sender: UserId, receiver: UserId) -> Message {
        Message::new(
            MessageId::generate(),
            sender,
            receiver,
            MessageBody::new("hi").unwrap(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn unread_accumulates_until_marked_read() {
        let me = UserId::new(Uuid::new_v4());
        let partner = UserId::new(Uuid::new_v4());
        let mut entry = ConversationEntry::new(partner);

        entry.record_message(message(partner, me), true);
        entry.record_message(message(partner, me), true);
        assert_eq!(entry.unread_count, 2);

        entry.mark_read();
        assert_eq!(entry.unread_count, 0);
        assert!(entry.last_message.is_some());
    }

    #[test]
    fn viewing_suppresses_unread_but_keeps_last_message() {
        let me = UserId::new(Uuid::new_v4());
        let partner = UserId::new(Uuid::new_v4());
        let mut entry = ConversationEntry::new(partner);

        let msg = message(partner, me);
        entry.record_message(msg.clone(), false);

        assert_eq!(entry.unread_count, 0);
        assert_eq!(entry.last_message, Some(msg));
    }
}
