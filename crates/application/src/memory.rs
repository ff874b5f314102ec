//! 内存仓储实现（用于测试和单机部署）
//!
//! 行为与 Postgres 实现保持一致：消息按写入顺序排列，会话行
//! 的未读累计是原子的，工单认领/关闭在一把写锁内完成比较并
//! 交换——并发认领同样恰好一个赢家。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use domain::{
    ConversationEntry, ConversationRepository, Message, MessageId, MessageRepository,
    RepositoryError, RepositoryResult, SupportMessage, SupportTicket, TicketId, TicketRepository,
    Timestamp, UserId,
};

/// 内存私信仓储。
#[derive(Default)]
pub struct InMemoryMessageRepository {
    /// 写入顺序即存储定义的消息顺序
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: Message) -> RepositoryResult<Message> {
        let mut messages = self.messages.write().await;
        messages.push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        let messages = self.messages.read().await;
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }

    async fn history(
        &self,
        user_a: UserId,
        user_b: UserId,
        limit: u32,
        before: Option<MessageId>,
    ) -> RepositoryResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let mut page: Vec<Message> = messages
            .iter()
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == user_b)
                    || (m.sender_id == user_b && m.receiver_id == user_a)
            })
            .cloned()
            .collect();
        // 新的在前
        page.reverse();

        if let Some(before_id) = before {
            if let Some(pos) = page.iter().position(|m| m.id == before_id) {
                page = page.split_off(pos + 1);
            }
        }

        page.truncate(limit as usize);
        Ok(page)
    }
}

/// 内存会话仓储。
#[derive(Default)]
pub struct InMemoryConversationRepository {
    /// (观察者, 对端) -> 会话行
    entries: RwLock<HashMap<(UserId, UserId), ConversationEntry>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接覆盖存储中的未读数（测试里模拟权威值漂移用）。
    pub async fn force_unread(&self, owner_id: UserId, partner_id: UserId, unread: u32) {
        let mut entries = self.entries.write().await;
        entries
            .entry((owner_id, partner_id))
            .or_insert_with(|| ConversationEntry::new(partner_id))
            .unread_count = unread;
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn record_for_sender(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
    ) -> RepositoryResult<ConversationEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry((owner_id, partner_id))
            .or_insert_with(|| ConversationEntry::new(partner_id));
        entry.record_message(message.clone(), false);
        Ok(entry.clone())
    }

    async fn record_for_receiver(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
        count_unread: bool,
    ) -> RepositoryResult<ConversationEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry((owner_id, partner_id))
            .or_insert_with(|| ConversationEntry::new(partner_id));
        entry.record_message(message.clone(), count_unread);
        Ok(entry.clone())
    }

    async fn mark_read(&self, owner_id: UserId, partner_id: UserId) -> RepositoryResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&(owner_id, partner_id)) {
            entry.mark_read();
        }
        Ok(())
    }

    async fn list_for_user(&self, owner_id: UserId) -> RepositoryResult<Vec<ConversationEntry>> {
        let entries = self.entries.read().await;
        let mut list: Vec<ConversationEntry> = entries
            .iter()
            .filter(|((owner, _), _)| *owner == owner_id)
            .map(|(_, entry)| entry.clone())
            .collect();
        // 最近更新的会话排前面
        list.sort_by(|a, b| {
            let at = a.last_message.as_ref().map(|m| m.created_at);
            let bt = b.last_message.as_ref().map(|m| m.created_at);
            bt.cmp(&at)
        });
        Ok(list)
    }

    async fn unread_count(&self, owner_id: UserId, partner_id: UserId) -> RepositoryResult<u32> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(owner_id, partner_id))
            .map(|entry| entry.unread_count)
            .unwrap_or(0))
    }
}

#[derive(Default)]
struct TicketStore {
    tickets: HashMap<TicketId, SupportTicket>,
    messages: HashMap<TicketId, Vec<SupportMessage>>,
}

/// 内存工单仓储。认领/关闭在写锁内做比较并交换。
#[derive(Default)]
pub struct InMemoryTicketRepository {
    store: RwLock<TicketStore>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn create(&self, ticket: SupportTicket) -> RepositoryResult<SupportTicket> {
        let mut store = self.store.write().await;
        // 对应 Postgres 上的部分唯一索引：每个发起人最多一张进行中的工单
        let has_active = store
            .tickets
            .values()
            .any(|t| t.requester_id == ticket.requester_id && t.is_active());
        if has_active {
            return Err(RepositoryError::Conflict);
        }

        store.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn find_by_id(&self, id: TicketId) -> RepositoryResult<Option<SupportTicket>> {
        let store = self.store.read().await;
        Ok(store.tickets.get(&id).cloned())
    }

    async fn find_active_by_requester(
        &self,
        requester_id: UserId,
    ) -> RepositoryResult<Option<SupportTicket>> {
        let store = self.store.read().await;
        Ok(store
            .tickets
            .values()
            .find(|t| t.requester_id == requester_id && t.is_active())
            .cloned())
    }

    async fn claim(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
    ) -> RepositoryResult<Option<SupportTicket>> {
        let mut store = self.store.write().await;
        let Some(ticket) = store.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        // 守卫在当前记录上求值；失败时返回 None，由调用方定性
        match ticket.claim(admin_id) {
            Ok(()) => Ok(Some(ticket.clone())),
            Err(_) => Ok(None),
        }
    }

    async fn close(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
        closed_at: Timestamp,
    ) -> RepositoryResult<Option<SupportTicket>> {
        let mut store = self.store.write().await;
        let Some(ticket) = store.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        match ticket.close(admin_id, closed_at) {
            Ok(()) => Ok(Some(ticket.clone())),
            Err(_) => Ok(None),
        }
    }

    async fn list_open(&self) -> RepositoryResult<Vec<SupportTicket>> {
        let store = self.store.read().await;
        let mut open: Vec<SupportTicket> = store
            .tickets
            .values()
            .filter(|t| t.status == domain::TicketStatus::Open)
            .cloned()
            .collect();
        open.sort_by_key(|t| t.created_at);
        Ok(open)
    }

    async fn append_message(&self, message: SupportMessage) -> RepositoryResult<SupportMessage> {
        let mut store = self.store.write().await;
        if !store.tickets.contains_key(&message.ticket_id) {
            return Err(RepositoryError::NotFound);
        }
        store
            .messages
            .entry(message.ticket_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, ticket_id: TicketId) -> RepositoryResult<Vec<SupportMessage>> {
        let store = self.store.read().await;
        Ok(store.messages.get(&ticket_id).cloned().unwrap_or_default())
    }
}
