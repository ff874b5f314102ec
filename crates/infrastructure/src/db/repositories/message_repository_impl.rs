//! 私信仓储的 PostgreSQL 实现

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::{
    Message, MessageBody, MessageId, MessageRepository, RepositoryError, RepositoryResult, UserId,
};

use crate::db::repositories::map_sqlx_error;
use crate::db::DbPool;

/// 数据库消息行
#[derive(Debug, Clone, FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    body: String,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> RepositoryResult<Message> {
        let body = MessageBody::new(self.body)
            .map_err(|e| RepositoryError::storage(format!("corrupt message row: {e}")))?;
        Ok(Message::from_record(
            MessageId::from(self.id),
            UserId::from(self.sender_id),
            UserId::from(self.receiver_id),
            body,
            self.created_at,
        ))
    }
}

pub struct PgMessageRepository {
    pool: DbPool,
}

impl PgMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> RepositoryResult<Message> {
        sqlx::query(
            r#"INSERT INTO messages (id, sender_id, receiver_id, body, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.receiver_id))
        .bind(message.body.as_str())
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> RepositoryResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"SELECT id, sender_id, receiver_id, body, created_at
               FROM messages WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(MessageRow::into_message).transpose()
    }

    async fn history(
        &self,
        user_a: UserId,
        user_b: UserId,
        limit: u32,
        before: Option<MessageId>,
    ) -> RepositoryResult<Vec<Message>> {
        let rows = match before {
            Some(before_id) => {
                sqlx::query_as::<_, MessageRow>(
                    r#"SELECT m.id, m.sender_id, m.receiver_id, m.body, m.created_at
                       FROM messages m, messages anchor
                       WHERE anchor.id = $3
                         AND ((m.sender_id = $1 AND m.receiver_id = $2)
                           OR (m.sender_id = $2 AND m.receiver_id = $1))
                         AND (m.created_at, m.id) < (anchor.created_at, anchor.id)
                       ORDER BY m.created_at DESC, m.id DESC
                       LIMIT $4"#,
                )
                .bind(Uuid::from(user_a))
                .bind(Uuid::from(user_b))
                .bind(Uuid::from(before_id))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, MessageRow>(
                    r#"SELECT id, sender_id, receiver_id, body, created_at
                       FROM messages
                       WHERE (sender_id = $1 AND receiver_id = $2)
                          OR (sender_id = $2 AND receiver_id = $1)
                       ORDER BY created_at DESC, id DESC
                       LIMIT $3"#,
                )
                .bind(Uuid::from(user_a))
                .bind(Uuid::from(user_b))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }
}
