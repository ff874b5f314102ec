//! 会话聚合器
//!
//! 维护每个用户的会话列表、最近消息和未读数。未读数的权威值
//! 在可信存储里；这里的缓存只会被权威值整体覆盖，从不合并。
//! "正在查看哪个会话"用显式标记跟踪：只有接收方恰好在看这个
//! 会话时，新消息才不计入未读。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use domain::{
    ConversationEntry, ConversationRepository, Message, MessageBody, MessageId, MessageRepository,
    RealtimeEvent, UserId,
};

use crate::clock::Clock;
use crate::error::ApplicationResult;
use crate::registry::ConnectionRegistry;
use crate::relay::EventRelay;

/// 历史分页的默认/上限条数。
const HISTORY_LIMIT_MAX: u32 = 100;

pub struct ConversationService {
    message_repo: Arc<dyn MessageRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    registry: Arc<ConnectionRegistry>,
    relay: Arc<EventRelay>,
    clock: Arc<dyn Clock>,
    /// 活跃会话标记：用户 -> 正在查看的对端
    active: RwLock<HashMap<UserId, UserId>>,
    /// 会话缓存：观察者 -> (对端 -> 会话行)
    cache: RwLock<HashMap<UserId, HashMap<UserId, ConversationEntry>>>,
}

impl ConversationService {
    pub fn new(
        message_repo: Arc<dyn MessageRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        registry: Arc<ConnectionRegistry>,
        relay: Arc<EventRelay>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            message_repo,
            conversation_repo,
            registry,
            relay,
            clock,
            active: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 发送一条私信。
    ///
    /// 先落库，落库失败时不产生任何副作用（不计未读、不投递）。
    /// 落库成功后更新双方的会话行，再向双方扇出事件；发送方也
    /// 收到回显，保证多端状态一致。
    pub async fn send_message(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        body: String,
    ) -> ApplicationResult<Message> {
        let body = MessageBody::new(body)?;
        let message = Message::new(
            MessageId::generate(),
            sender_id,
            receiver_id,
            body,
            self.clock.now(),
        )?;

        let message = self.message_repo.create(message).await?;

        // 接收方恰好在看这个会话时不累计未读
        let receiver_viewing =
            self.active.read().await.get(&receiver_id).copied() == Some(sender_id);

        let sender_entry = self
            .conversation_repo
            .record_for_sender(sender_id, receiver_id, &message)
            .await?;
        let receiver_entry = self
            .conversation_repo
            .record_for_receiver(receiver_id, sender_id, &message, !receiver_viewing)
            .await?;
        let unread_count = receiver_entry.unread_count;

        // 缓存用存储返回的权威行覆盖
        {
            let mut cache = self.cache.write().await;
            cache
                .entry(sender_id)
                .or_default()
                .insert(receiver_id, sender_entry);
            cache
                .entry(receiver_id)
                .or_default()
                .insert(sender_id, receiver_entry);
        }

        self.relay
            .emit(
                sender_id,
                RealtimeEvent::MessageReceived {
                    message: message.clone(),
                },
            )
            .await;
        self.relay
            .emit(
                receiver_id,
                RealtimeEvent::MessageReceived {
                    message: message.clone(),
                },
            )
            .await;
        self.relay
            .emit(
                receiver_id,
                RealtimeEvent::ConversationUpdated {
                    partner_id: sender_id,
                    unread_count,
                },
            )
            .await;

        info!(
            message_id = %message.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            unread_count,
            "message sent"
        );
        Ok(message)
    }

    /// 打开会话：设置活跃标记并清零未读。
    /// 未读归零对该用户的所有连接同时生效。
    pub async fn open_conversation(
        &self,
        user_id: UserId,
        partner_id: UserId,
    ) -> ApplicationResult<()> {
        {
            let mut active = self.active.write().await;
            active.insert(user_id, partner_id);
        }
        self.mark_conversation_read(user_id, partner_id).await?;

        debug!(user_id = %user_id, partner_id = %partner_id, "conversation opened");
        Ok(())
    }

    /// 关闭会话：清除活跃标记，之后的新消息重新累计未读。
    pub async fn close_conversation(&self, user_id: UserId) {
        let mut active = self.active.write().await;
        active.remove(&user_id);
    }

    /// 用户的最后一条连接断开时清掉活跃标记，
    /// 否则离线的"查看者"会永远压住未读计数。
    pub async fn connection_closed(&self, user_id: UserId) {
        if self.registry.connection_count(user_id).await == 0 {
            self.close_conversation(user_id).await;
        }
    }

    /// 会话列表。每次都读权威存储并整体覆盖缓存——断连期间
    /// 缓存可能落后，以存储为准。
    pub async fn conversations_of(
        &self,
        user_id: UserId,
    ) -> ApplicationResult<Vec<ConversationEntry>> {
        let entries = self.conversation_repo.list_for_user(user_id).await?;

        let mut cache = self.cache.write().await;
        let user_cache = cache.entry(user_id).or_default();
        user_cache.clear();
        for entry in &entries {
            user_cache.insert(entry.partner_id, entry.clone());
        }

        Ok(entries)
    }

    /// 拉取与某个对端的消息历史。按约定，拉取历史就是未读数
    /// 归零的时刻。
    pub async fn history(
        &self,
        user_id: UserId,
        partner_id: UserId,
        limit: u32,
        before: Option<MessageId>,
    ) -> ApplicationResult<Vec<Message>> {
        let limit = limit.min(HISTORY_LIMIT_MAX);
        self.mark_conversation_read(user_id, partner_id).await?;
        let messages = self
            .message_repo
            .history(user_id, partner_id, limit, before)
            .await?;
        Ok(messages)
    }

    /// 缓存中的会话行快照（测试和诊断用）。
    pub async fn cached_entry(
        &self,
        user_id: UserId,
        partner_id: UserId,
    ) -> Option<ConversationEntry> {
        let cache = self.cache.read().await;
        cache.get(&user_id).and_then(|m| m.get(&partner_id)).cloned()
    }

    /// 当前活跃会话标记（测试和诊断用）。
    pub async fn active_partner(&self, user_id: UserId) -> Option<UserId> {
        self.active.read().await.get(&user_id).copied()
    }

    /// 未读归零的公共路径：写穿存储，覆盖缓存，并把新状态推给
    /// 该用户的所有连接。
    async fn mark_conversation_read(
        &self,
        user_id: UserId,
        partner_id: UserId,
    ) -> ApplicationResult<()> {
        self.conversation_repo.mark_read(user_id, partner_id).await?;

        {
            let mut cache = self.cache.write().await;
            if let Some(entry) = cache
                .entry(user_id)
                .or_default()
                .get_mut(&partner_id)
            {
                entry.mark_read();
            }
        }

        self.relay
            .emit(
                user_id,
                RealtimeEvent::ConversationUpdated {
                    partner_id,
                    unread_count: 0,
                },
            )
            .await;
        Ok(())
    }
}
