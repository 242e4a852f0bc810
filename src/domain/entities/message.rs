//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Text stored in place of the original content once a message is deleted.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

/// Represents a chat message.
///
/// A message with a `receiver_id` is private; without one it is public.
///
/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - sender_id: BIGINT NOT NULL REFERENCES users(id)
/// - receiver_id: BIGINT NULL REFERENCES users(id)
/// - text: TEXT NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - is_deleted: BOOLEAN NOT NULL DEFAULT FALSE
/// - is_edited: BOOLEAN NOT NULL DEFAULT FALSE
/// - edited_at: TIMESTAMPTZ NULL
/// - is_delivered: BOOLEAN NOT NULL DEFAULT FALSE
/// - is_seen: BOOLEAN NOT NULL DEFAULT FALSE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,

    pub sender_id: i64,

    /// Recipient of a private message; `None` for public messages
    pub receiver_id: Option<i64>,

    pub text: String,

    pub created_at: DateTime<Utc>,

    pub is_deleted: bool,

    pub is_edited: bool,

    pub edited_at: Option<DateTime<Utc>>,

    /// Receiver had a live connection when the message was persisted.
    /// Never updated afterwards.
    pub is_delivered: bool,

    /// Receiver acknowledged the conversation. Not gated on `is_delivered`.
    pub is_seen: bool,
}

impl Message {
    /// Check if this is a private (point-to-point) message.
    pub fn is_private(&self) -> bool {
        self.receiver_id.is_some()
    }

    /// Check if `user_id` sent this message.
    pub fn is_sent_by(&self, user_id: i64) -> bool {
        self.sender_id == user_id
    }

    /// Replace the text and stamp the edit.
    pub fn apply_edit(&mut self, new_text: String, at: DateTime<Utc>) {
        self.text = new_text;
        self.is_edited = true;
        self.edited_at = Some(at);
    }

    /// Soft-delete: the row stays, the content does not.
    pub fn apply_delete(&mut self) {
        self.is_deleted = true;
        self.text = DELETED_PLACEHOLDER.to_string();
    }
}

/// Fields supplied when persisting a new message; the store assigns `id` and
/// `created_at`, and every flag starts out `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub text: String,
}

/// Predicates understood by [`MessageRepository::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFilter {
    /// Every message without a receiver.
    Public,
    /// Private messages exchanged between two users, in either direction.
    Conversation { user_a: i64, user_b: i64 },
    /// Private messages from `sender_id` to `receiver_id` not yet seen.
    Unseen { sender_id: i64, receiver_id: i64 },
}

impl MessageFilter {
    /// Evaluate the predicate against a single message.
    pub fn matches(&self, message: &Message) -> bool {
        match *self {
            MessageFilter::Public => message.receiver_id.is_none(),
            MessageFilter::Conversation { user_a, user_b } => {
                (message.sender_id == user_a && message.receiver_id == Some(user_b))
                    || (message.sender_id == user_b && message.receiver_id == Some(user_a))
            }
            MessageFilter::Unseen {
                sender_id,
                receiver_id,
            } => {
                message.sender_id == sender_id
                    && message.receiver_id == Some(receiver_id)
                    && !message.is_seen
            }
        }
    }
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message, assigning its id and creation timestamp.
    async fn create(&self, message: NewMessage) -> Result<Message, AppError>;

    /// Find a message by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Write back the mutable fields (text and flags) of a message.
    async fn update(&self, message: &Message) -> Result<(), AppError>;

    /// Return every message matching `filter`, oldest first (ties by id).
    async fn query(&self, filter: MessageFilter) -> Result<Vec<Message>, AppError>;
}
