//! Message Repository Implementation
//!
//! PostgreSQL implementation of message persistence and the history
//! predicates used by the router.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageFilter, MessageRepository, NewMessage};
use crate::shared::error::AppError;

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, text, created_at, is_deleted, \
     is_edited, edited_at, is_delivered, is_seen";

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    sender_id: i64,
    receiver_id: Option<i64>,
    text: String,
    created_at: DateTime<Utc>,
    is_deleted: bool,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    is_seen: bool,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            text: row.text,
            created_at: row.created_at,
            is_deleted: row.is_deleted,
            is_edited: row.is_edited,
            edited_at: row.edited_at,
            is_delivered: row.is_delivered,
            is_seen: row.is_seen,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, AppError> {
        let sql = format!(
            "INSERT INTO messages (sender_id, receiver_id, text) VALUES ($1, $2, $3) RETURNING {}",
            MESSAGE_COLUMNS
        );

        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(message.sender_id)
            .bind(message.receiver_id)
            .bind(&message.text)
            .fetch_one(&self.pool)
            .await?;

        Ok(Message::from(row))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let sql = format!("SELECT {} FROM messages WHERE id = $1", MESSAGE_COLUMNS);

        let row = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Message::from))
    }

    async fn update(&self, message: &Message) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET text = $2,
                is_deleted = $3,
                is_edited = $4,
                edited_at = $5,
                is_delivered = $6,
                is_seen = $7
            WHERE id = $1
            "#,
        )
        .bind(message.id)
        .bind(&message.text)
        .bind(message.is_deleted)
        .bind(message.is_edited)
        .bind(message.edited_at)
        .bind(message.is_delivered)
        .bind(message.is_seen)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Message {} not found", message.id)));
        }

        Ok(())
    }

    async fn query(&self, filter: MessageFilter) -> Result<Vec<Message>, AppError> {
        let rows = match filter {
            MessageFilter::Public => {
                let sql = format!(
                    "SELECT {} FROM messages WHERE receiver_id IS NULL ORDER BY created_at ASC, id ASC",
                    MESSAGE_COLUMNS
                );
                sqlx::query_as::<_, MessageRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
            MessageFilter::Conversation { user_a, user_b } => {
                let sql = format!(
                    "SELECT {} FROM messages \
                     WHERE (sender_id = $1 AND receiver_id = $2) \
                        OR (sender_id = $2 AND receiver_id = $1) \
                     ORDER BY created_at ASC, id ASC",
                    MESSAGE_COLUMNS
                );
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(user_a)
                    .bind(user_b)
                    .fetch_all(&self.pool)
                    .await?
            }
            MessageFilter::Unseen {
                sender_id,
                receiver_id,
            } => {
                let sql = format!(
                    "SELECT {} FROM messages \
                     WHERE sender_id = $1 AND receiver_id = $2 AND is_seen = FALSE \
                     ORDER BY created_at ASC, id ASC",
                    MESSAGE_COLUMNS
                );
                sqlx::query_as::<_, MessageRow>(&sql)
                    .bind(sender_id)
                    .bind(receiver_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Message::from).collect())
    }
}
