//! 会话仓储的 PostgreSQL 实现
//!
//! 未读累计用单条带 ON CONFLICT 的 upsert 完成并返回写入后的
//! 权威值，并发发送不会丢计数。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::{
    ConversationEntry, ConversationRepository, Message, MessageBody, MessageId, RepositoryError,
    RepositoryResult, UserId,
};

use crate::db::repositories::map_sqlx_error;
use crate::db::DbPool;

/// 会话列表查询行（带最近消息的左连接）
#[derive(Debug, Clone, FromRow)]
struct ConversationRow {
    partner_id: Uuid,
    unread_count: i32,
    message_id: Option<Uuid>,
    sender_id: Option<Uuid>,
    receiver_id: Option<Uuid>,
    body: Option<String>,
    message_created_at: Option<DateTime<Utc>>,
}

impl ConversationRow {
    fn into_entry(self) -> RepositoryResult<ConversationEntry> {
        let last_message = match (
            self.message_id,
            self.sender_id,
            self.receiver_id,
            self.body,
            self.message_created_at,
        ) {
            (Some(id), Some(sender), Some(receiver), Some(body), Some(created_at)) => {
                let body = MessageBody::new(body)
                    .map_err(|e| RepositoryError::storage(format!("corrupt message row: {e}")))?;
                Some(Message::from_record(
                    MessageId::from(id),
                    UserId::from(sender),
                    UserId::from(receiver),
                    body,
                    created_at,
                ))
            }
            _ => None,
        };

        Ok(ConversationEntry {
            partner_id: UserId::from(self.partner_id),
            last_message,
            unread_count: self.unread_count.max(0) as u32,
        })
    }
}

pub struct PgConversationRepository {
    pool: DbPool,
}

impl PgConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn upsert(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
        increment: i32,
    ) -> RepositoryResult<ConversationEntry> {
        let (unread_count,): (i32,) = sqlx::query_as(
            r#"INSERT INTO conversations (owner_id, partner_id, last_message_id, unread_count, updated_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (owner_id, partner_id)
               DO UPDATE SET last_message_id = EXCLUDED.last_message_id,
                             unread_count = conversations.unread_count + $4,
                             updated_at = EXCLUDED.updated_at
               RETURNING unread_count"#,
        )
        .bind(Uuid::from(owner_id))
        .bind(Uuid::from(partner_id))
        .bind(Uuid::from(message.id))
        .bind(increment)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ConversationEntry {
            partner_id,
            last_message: Some(message.clone()),
            unread_count: unread_count.max(0) as u32,
        })
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn record_for_sender(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
    ) -> RepositoryResult<ConversationEntry> {
        self.upsert(owner_id, partner_id, message, 0).await
    }

    async fn record_for_receiver(
        &self,
        owner_id: UserId,
        partner_id: UserId,
        message: &Message,
        count_unread: bool,
    ) -> RepositoryResult<ConversationEntry> {
        self.upsert(owner_id, partner_id, message, i32::from(count_unread))
            .await
    }

    async fn mark_read(&self, owner_id: UserId, partner_id: UserId) -> RepositoryResult<()> {
        sqlx::query(
            r#"UPDATE conversations SET unread_count = 0
               WHERE owner_id = $1 AND partner_id = $2"#,
        )
        .bind(Uuid::from(owner_id))
        .bind(Uuid::from(partner_id))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_for_user(&self, owner_id: UserId) -> RepositoryResult<Vec<ConversationEntry>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"SELECT c.partner_id, c.unread_count,
                      m.id AS message_id, m.sender_id, m.receiver_id, m.body,
                      m.created_at AS message_created_at
               FROM conversations c
               LEFT JOIN messages m ON m.id = c.last_message_id
               WHERE c.owner_id = $1
               ORDER BY c.updated_at DESC"#,
        )
        .bind(Uuid::from(owner_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ConversationRow::into_entry).collect()
    }

    async fn unread_count(&self, owner_id: UserId, partner_id: UserId) -> RepositoryResult<u32> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"SELECT unread_count FROM conversations
               WHERE owner_id = $1 AND partner_id = $2"#,
        )
        .bind(Uuid::from(owner_id))
        .bind(Uuid::from(partner_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|(count,)| count.max(0) as u32).unwrap_or(0))
    }
}
