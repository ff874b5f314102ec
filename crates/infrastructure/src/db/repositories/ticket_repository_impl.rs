//! 客服工单仓储的 PostgreSQL 实现
//!
//! 认领是一条 `UPDATE ... WHERE status = 'open'` 的条件写：
//! 并发认领同一张工单时数据库保证恰好一行生效，其余拿到空
//! 结果。关闭同理（附加认领人匹配）。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::{
    MessageBody, MessageId, RepositoryError, RepositoryResult, SupportMessage, SupportTicket,
    TicketId, TicketRepository, TicketStatus, Timestamp, UserId, UserRole,
};

use crate::db::repositories::map_sqlx_error;
use crate::db::DbPool;

/// 数据库工单行
#[derive(Debug, Clone, FromRow)]
struct TicketRow {
    id: Uuid,
    requester_id: Uuid,
    status: String,
    assigned_admin_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl TicketRow {
    fn into_ticket(self) -> RepositoryResult<SupportTicket> {
        let status = TicketStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::storage(format!("unexpected ticket status: {}", self.status))
        })?;

        Ok(SupportTicket {
            id: TicketId::from(self.id),
            requester_id: UserId::from(self.requester_id),
            status,
            assigned_admin_id: self.assigned_admin_id.map(UserId::from),
            created_at: self.created_at,
            closed_at: self.closed_at,
        })
    }
}

/// 数据库工单留言行
#[derive(Debug, Clone, FromRow)]
struct SupportMessageRow {
    id: Uuid,
    ticket_id: Uuid,
    sender_id: Uuid,
    sender_role: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl SupportMessageRow {
    fn into_message(self) -> RepositoryResult<SupportMessage> {
        let sender_role = UserRole::parse(&self.sender_role).ok_or_else(|| {
            RepositoryError::storage(format!("unexpected sender role: {}", self.sender_role))
        })?;
        let body = MessageBody::new(self.body)
            .map_err(|e| RepositoryError::storage(format!("corrupt support message row: {e}")))?;

        Ok(SupportMessage {
            id: MessageId::from(self.id),
            ticket_id: TicketId::from(self.ticket_id),
            sender_id: UserId::from(self.sender_id),
            sender_role,
            body,
            created_at: self.created_at,
        })
    }
}

const TICKET_COLUMNS: &str = "id, requester_id, status, assigned_admin_id, created_at, closed_at";

pub struct PgTicketRepository {
    pool: DbPool,
}

impl PgTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn create(&self, ticket: SupportTicket) -> RepositoryResult<SupportTicket> {
        // 部分唯一索引 support_tickets_active_requester_idx 保证
        // 并发创建只有一行落地，撞上的拿到 Conflict
        sqlx::query(
            r#"INSERT INTO support_tickets
               (id, requester_id, status, assigned_admin_id, created_at, closed_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(Uuid::from(ticket.id))
        .bind(Uuid::from(ticket.requester_id))
        .bind(ticket.status.as_str())
        .bind(ticket.assigned_admin_id.map(Uuid::from))
        .bind(ticket.created_at)
        .bind(ticket.closed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ticket)
    }

    async fn find_by_id(&self, id: TicketId) -> RepositoryResult<Option<SupportTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(TicketRow::into_ticket).transpose()
    }

    async fn find_active_by_requester(
        &self,
        requester_id: UserId,
    ) -> RepositoryResult<Option<SupportTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets
             WHERE requester_id = $1 AND status <> 'closed'
             LIMIT 1"
        ))
        .bind(Uuid::from(requester_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(TicketRow::into_ticket).transpose()
    }

    async fn claim(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
    ) -> RepositoryResult<Option<SupportTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "UPDATE support_tickets
             SET status = 'assigned', assigned_admin_id = $2
             WHERE id = $1 AND status = 'open'
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(Uuid::from(ticket_id))
        .bind(Uuid::from(admin_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(TicketRow::into_ticket).transpose()
    }

    async fn close(
        &self,
        ticket_id: TicketId,
        admin_id: UserId,
        closed_at: Timestamp,
    ) -> RepositoryResult<Option<SupportTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "UPDATE support_tickets
             SET status = 'closed', closed_at = $3
             WHERE id = $1 AND status = 'assigned' AND assigned_admin_id = $2
             RETURNING {TICKET_COLUMNS}"
        ))
        .bind(Uuid::from(ticket_id))
        .bind(Uuid::from(admin_id))
        .bind(closed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(TicketRow::into_ticket).transpose()
    }

    async fn list_open(&self) -> RepositoryResult<Vec<SupportTicket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets
             WHERE status = 'open'
             ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(TicketRow::into_ticket).collect()
    }

    async fn append_message(&self, message: SupportMessage) -> RepositoryResult<SupportMessage> {
        sqlx::query(
            r#"INSERT INTO support_messages
               (id, ticket_id, sender_id, sender_role, body, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.ticket_id))
        .bind(Uuid::from(message.sender_id))
        .bind(message.sender_role.as_str())
        .bind(message.body.as_str())
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(message)
    }

    async fn list_messages(&self, ticket_id: TicketId) -> RepositoryResult<Vec<SupportMessage>> {
        let rows = sqlx::query_as::<_, SupportMessageRow>(
            r#"SELECT id, ticket_id, sender_id, sender_role, body, created_at
               FROM support_messages
               WHERE ticket_id = $1
               ORDER BY created_at, id"#,
        )
        .bind(Uuid::from(ticket_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SupportMessageRow::into_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_row_maps_every_status() {
        for (status, expected) in [
            ("open", TicketStatus::Open),
            ("assigned", TicketStatus::Assigned),
            ("closed", TicketStatus::Closed),
        ] {
            let row = TicketRow {
                id: Uuid::new_v4(),
                requester_id: Uuid::new_v4(),
                status: status.to_string(),
                assigned_admin_id: None,
                created_at: Utc::now(),
                closed_at: None,
            };
            assert_eq!(row.into_ticket().unwrap().status, expected);
        }
    }

    #[test]
    fn unknown_status_is_a_storage_error() {
        let row = TicketRow {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            status: "reopened".to_string(),
            assigned_admin_id: None,
            created_at: Utc::now(),
            closed_at: None,
        };
        assert!(matches!(
            row.into_ticket(),
            Err(RepositoryError::Storage { .. })
        ));
    }

    #[test]
    fn support_message_row_maps_role() {
        let row = SupportMessageRow {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            sender_role: "admin".to_string(),
            body: "how can I help".to_string(),
            created_at: Utc::now(),
        };
        let message = row.into_message().unwrap();
        assert_eq!(message.sender_role, UserRole::Admin);
    }
}
