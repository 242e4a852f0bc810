//! Message Service
//!
//! Routes chat messages to live connections and propagates edit, delete
//! and seen transitions.
//!
//! Every transition is persisted before anything is pushed to clients, so
//! the flags carried by an event always match the stored row. When a write
//! fails the event is not sent.
//!
//! Read-modify-write transitions on one message are serialized by a
//! per-message lock, held from the read until the event is queued.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use crate::domain::{
    Message, MessageFilter, MessageRepository, NewMessage, Session, SessionRepository,
    UserRepository,
};
use crate::infrastructure::metrics;
use crate::presentation::websocket::{
    Gateway, InboundMessage, MessagePayload, Outbound, ServerEvent,
};
use crate::shared::error::AppError;

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid or inactive session")]
    InvalidSession,

    #[error("Message text is empty")]
    EmptyContent,

    #[error("Receiver not found")]
    ReceiverNotFound,

    #[error("Message not found")]
    NotFound,

    #[error("Only the sender may modify this message")]
    Forbidden,

    #[error("Message has been deleted")]
    AlreadyDeleted,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::InvalidSession => AppError::Unauthorized("Invalid session token".into()),
            MessageError::EmptyContent => AppError::Validation("Message text is empty".into()),
            MessageError::ReceiverNotFound => AppError::NotFound("Receiver not found".into()),
            MessageError::NotFound => AppError::NotFound("Message not found".into()),
            MessageError::Forbidden => {
                AppError::Forbidden("Only the sender may modify this message".into())
            }
            MessageError::AlreadyDeleted => AppError::Conflict("Message has been deleted".into()),
            MessageError::Store(e) => e,
        }
    }
}

/// The message router.
pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<Gateway>,
    message_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<Gateway>,
    ) -> Self {
        Self {
            messages,
            sessions,
            users,
            gateway,
            message_locks: DashMap::new(),
        }
    }

    fn message_lock(&self, message_id: i64) -> Arc<Mutex<()>> {
        self.message_locks.entry(message_id).or_default().clone()
    }

    async fn session_for(&self, token: &str) -> Result<Session, MessageError> {
        self.sessions
            .find_by_token(token)
            .await?
            .ok_or(MessageError::InvalidSession)
    }

    /// Load a message and check that `user_id` sent it.
    async fn owned_message(&self, user_id: i64, message_id: i64) -> Result<Message, MessageError> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)?;

        if !message.is_sent_by(user_id) {
            tracing::debug!(
                user_id = user_id,
                message_id = message_id,
                sender_id = message.sender_id,
                "Rejected modification by non-sender"
            );
            return Err(MessageError::Forbidden);
        }

        Ok(message)
    }

    /// Persist and route an inbound chat message from `sender_token`.
    ///
    /// Private messages go to the receiver's connection (if any) and are
    /// echoed to the sender; public messages are broadcast to everyone,
    /// sender included. Returns the payload that was routed.
    pub async fn send(
        &self,
        sender_token: &str,
        inbound: InboundMessage,
    ) -> Result<MessagePayload, MessageError> {
        let session = self.session_for(sender_token).await?;

        if inbound.text.trim().is_empty() {
            return Err(MessageError::EmptyContent);
        }

        let sender = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(MessageError::InvalidSession)?;

        if let Some(receiver_id) = inbound.receiver_id {
            if self.users.find_by_id(receiver_id).await?.is_none() {
                return Err(MessageError::ReceiverNotFound);
            }
        }

        let mut message = self
            .messages
            .create(NewMessage {
                sender_id: sender.id,
                receiver_id: inbound.receiver_id,
                text: inbound.text,
            })
            .await?;

        if let Some(receiver_id) = message.receiver_id {
            if self.gateway.is_online(receiver_id) {
                let lock = self.message_lock(message.id);
                let _guard = lock.lock().await;
                message.is_delivered = true;
                self.messages.update(&message).await?;
            }
        }

        let payload = MessagePayload::from_message(&message, sender.user_name);
        let event = ServerEvent::Message(payload.clone());

        match message.receiver_id {
            Some(receiver_id) => {
                // a note to self reaches the sender once
                if receiver_id != sender.id {
                    self.gateway.send_to_user(receiver_id, event.clone());
                }
                self.gateway.send_to(sender_token, event);
            }
            None => {
                self.gateway.broadcast(event);
            }
        }

        metrics::record_message_routed(message.is_private());
        tracing::debug!(
            message_id = message.id,
            sender_id = message.sender_id,
            receiver_id = ?message.receiver_id,
            delivered = message.is_delivered,
            "Message routed"
        );

        Ok(payload)
    }

    /// Replace the text of a message the caller sent.
    ///
    /// The edit event goes to every connection, whatever the message's
    /// audience.
    pub async fn edit(
        &self,
        token: &str,
        message_id: i64,
        new_text: &str,
    ) -> Result<Message, MessageError> {
        let session = self.session_for(token).await?;
        let lock = self.message_lock(message_id);
        let _guard = lock.lock().await;
        let mut message = self.owned_message(session.user_id, message_id).await?;

        if message.is_deleted {
            return Err(MessageError::AlreadyDeleted);
        }
        if new_text.trim().is_empty() {
            return Err(MessageError::EmptyContent);
        }

        message.apply_edit(new_text.to_string(), Utc::now());
        self.messages.update(&message).await?;

        self.gateway.broadcast(ServerEvent::Edit {
            message_id: message.id,
            new_text: message.text.clone(),
            is_edited: true,
        });
        metrics::record_transition("edit");
        tracing::debug!(message_id = message.id, "Message edited");

        Ok(message)
    }

    /// Soft-delete a message the caller sent.
    ///
    /// Deleting an already deleted message succeeds without a second event.
    pub async fn delete(&self, token: &str, message_id: i64) -> Result<Message, MessageError> {
        let session = self.session_for(token).await?;
        let lock = self.message_lock(message_id);
        let _guard = lock.lock().await;
        let mut message = self.owned_message(session.user_id, message_id).await?;

        if message.is_deleted {
            return Ok(message);
        }

        message.apply_delete();
        self.messages.update(&message).await?;

        self.gateway.broadcast(ServerEvent::Delete {
            message_id: message.id,
        });
        metrics::record_transition("delete");
        tracing::debug!(message_id = message.id, "Message deleted");

        Ok(message)
    }

    /// Mark every unseen message from `counterparty_id` to the caller as
    /// seen. One event per updated message; returns how many were updated.
    ///
    /// `is_delivered` is left as it was.
    pub async fn mark_seen(&self, token: &str, counterparty_id: i64) -> Result<usize, MessageError> {
        let session = self.session_for(token).await?;

        let unseen = self
            .messages
            .query(MessageFilter::Unseen {
                sender_id: counterparty_id,
                receiver_id: session.user_id,
            })
            .await?;

        let mut updated = 0;
        for candidate in unseen {
            let lock = self.message_lock(candidate.id);
            let _guard = lock.lock().await;

            // re-read under the lock; a concurrent call may have won
            let mut message = match self.messages.find_by_id(candidate.id).await? {
                Some(m) if !m.is_seen => m,
                _ => continue,
            };
            message.is_seen = true;
            self.messages.update(&message).await?;
            self.gateway.broadcast(ServerEvent::Seen {
                message_id: message.id,
            });
            metrics::record_transition("seen");
            updated += 1;
        }

        if updated > 0 {
            tracing::debug!(
                user_id = session.user_id,
                counterparty_id = counterparty_id,
                count = updated,
                "Messages marked seen"
            );
        }

        Ok(updated)
    }

    /// Queue the public history on a connection's outbound channel, oldest
    /// first, ahead of any live event. Returns how many messages were queued.
    pub async fn replay_history(
        &self,
        token: &str,
        outbound: &mpsc::UnboundedSender<Outbound>,
    ) -> Result<usize, MessageError> {
        self.session_for(token).await?;

        let history = self.public_history().await?;
        let count = history.len();
        for payload in history {
            if outbound.send(Outbound::Event(ServerEvent::Message(payload))).is_err() {
                break;
            }
        }
        Ok(count)
    }

    /// All public messages, oldest first.
    pub async fn public_history(&self) -> Result<Vec<MessagePayload>, MessageError> {
        let messages = self.messages.query(MessageFilter::Public).await?;
        self.with_sender_names(messages).await
    }

    /// Private messages between the caller and `other_user_id`, in either
    /// direction, oldest first.
    pub async fn private_history(
        &self,
        token: &str,
        other_user_id: i64,
    ) -> Result<Vec<MessagePayload>, MessageError> {
        let session = self.session_for(token).await?;
        let messages = self
            .messages
            .query(MessageFilter::Conversation {
                user_a: session.user_id,
                user_b: other_user_id,
            })
            .await?;
        self.with_sender_names(messages).await
    }

    /// Render a single message the way clients see it.
    pub async fn to_payload(&self, message: Message) -> Result<MessagePayload, MessageError> {
        let mut payloads = self.with_sender_names(vec![message]).await?;
        payloads.pop().ok_or(MessageError::NotFound)
    }

    async fn with_sender_names(
        &self,
        messages: Vec<Message>,
    ) -> Result<Vec<MessagePayload>, MessageError> {
        let mut names: HashMap<i64, String> = HashMap::new();
        let mut payloads = Vec::with_capacity(messages.len());

        for message in &messages {
            if !names.contains_key(&message.sender_id) {
                let name = self
                    .users
                    .find_by_id(message.sender_id)
                    .await?
                    .map(|u| u.user_name)
                    .unwrap_or_else(|| "unknown".to_string());
                names.insert(message.sender_id, name);
            }
            let name = names.get(&message.sender_id).cloned().unwrap_or_default();
            payloads.push(MessagePayload::from_message(message, name));
        }

        Ok(payloads)
    }
}
