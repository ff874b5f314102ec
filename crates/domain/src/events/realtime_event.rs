//! 实时出站事件
//!
//! 经由事件中继推送到客户端连接的全部事件类型。事件只描述
//! 已经发生的事实，中继本身从不改动持久状态。

use serde::{Deserialize, Serialize};

use crate::entities::{Message, SupportMessage, SupportTicket};
use crate::errors::ConflictReason;
use crate::value_objects::{TicketId, UserId};

/// 推送给客户端的实时事件。
///
/// 序列化成 `{"event": "...", "data": {...}}` 的内标签形式，
/// 事件名即线上的协议名。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// 收到一条私信（发送方也会收到回显，用于多端同步）
    MessageReceived { message: Message },

    /// 某个会话的未读数发生变化
    ConversationUpdated {
        partner_id: UserId,
        unread_count: u32,
    },

    /// 对端正在输入；瞬时信号，不落库
    TypingIndicator { sender_id: UserId },

    /// 新工单等待认领（广播给客服；发起人收到同一事件作为确认）
    TicketOpened { ticket: SupportTicket },

    /// 工单已被认领
    TicketAssigned {
        ticket: SupportTicket,
        admin_id: UserId,
    },

    /// 认领失败，只发给发起认领的那条连接
    TicketClaimRejected {
        ticket_id: TicketId,
        reason: ConflictReason,
    },

    /// 工单已关闭
    TicketClosed { ticket: SupportTicket },

    /// 工单内新增留言
    SupportMessageReceived { message: SupportMessage },

    /// 请求被同步拒绝，只发给发起请求的那条连接，从不广播
    RequestRejected { code: String, message: String },
}

impl RealtimeEvent {
    /// 获取事件协议名。
    pub fn event_name(&self) -> &'static str {
        match self {
            RealtimeEvent::MessageReceived { .. } => "message_received",
            RealtimeEvent::ConversationUpdated { .. } => "conversation_updated",
            RealtimeEvent::TypingIndicator { .. } => "typing_indicator",
            RealtimeEvent::TicketOpened { .. } => "ticket_opened",
            RealtimeEvent::TicketAssigned { .. } => "ticket_assigned",
            RealtimeEvent::TicketClaimRejected { .. } => "ticket_claim_rejected",
            RealtimeEvent::TicketClosed { .. } => "ticket_closed",
            RealtimeEvent::SupportMessageReceived { .. } => "support_message_received",
            RealtimeEvent::RequestRejected { .. } => "request_rejected",
        }
    }
}
