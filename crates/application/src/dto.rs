use domain::{
    ConversationEntry, Message, SupportMessage, SupportTicket, TicketStatus, Timestamp, UserRole,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub body: String,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        Self {
            id: Uuid::from(message.id),
            sender_id: Uuid::from(message.sender_id),
            receiver_id: Uuid::from(message.receiver_id),
            body: message.body.as_str().to_owned(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationDto {
    pub partner_id: Uuid,
    pub last_message: Option<MessageDto>,
    pub unread_count: u32,
}

impl From<&ConversationEntry> for ConversationDto {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            partner_id: Uuid::from(entry.partner_id),
            last_message: entry.last_message.as_ref().map(MessageDto::from),
            unread_count: entry.unread_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDto {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub status: TicketStatus,
    pub assigned_admin_id: Option<Uuid>,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
}

impl From<&SupportTicket> for TicketDto {
    fn from(ticket: &SupportTicket) -> Self {
        Self {
            id: Uuid::from(ticket.id),
            requester_id: Uuid::from(ticket.requester_id),
            status: ticket.status,
            assigned_admin_id: ticket.assigned_admin_id.map(Into::into),
            created_at: ticket.created_at,
            closed_at: ticket.closed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportMessageDto {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: UserRole,
    pub body: String,
    pub created_at: Timestamp,
}

impl From<&SupportMessage> for SupportMessageDto {
    fn from(message: &SupportMessage) -> Self {
        Self {
            id: Uuid::from(message.id),
            ticket_id: Uuid::from(message.ticket_id),
            sender_id: Uuid::from(message.sender_id),
            sender_role: message.sender_role,
            body: message.body.as_str().to_owned(),
            created_at: message.created_at,
        }
    }
}
