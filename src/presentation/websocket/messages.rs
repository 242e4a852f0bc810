//! WebSocket Message Types
//!
//! Inbound chat frames, outbound events and close reasons.

use serde::{Deserialize, Serialize};

use crate::domain::Message;

/// A chat message received from a client.
///
/// Clients send either a bare string (legacy) or
/// `{"message": "...", "receiver_id": 42}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub receiver_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StructuredFrame {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    receiver_id: Option<i64>,
}

impl InboundMessage {
    /// Parse a text frame. Anything that is not a structured JSON object is
    /// taken verbatim as a public chat line.
    pub fn parse(raw: &str) -> Self {
        if raw.trim_start().starts_with('{') {
            if let Ok(frame) = serde_json::from_str::<StructuredFrame>(raw) {
                return Self {
                    text: frame.message.unwrap_or_default(),
                    receiver_id: frame.receiver_id,
                };
            }
        }

        Self {
            text: raw.to_string(),
            receiver_id: None,
        }
    }

    /// A public message with the given text.
    pub fn public(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            receiver_id: None,
        }
    }

    /// A private message with the given text.
    pub fn private(text: impl Into<String>, receiver_id: i64) -> Self {
        Self {
            text: text.into(),
            receiver_id: Some(receiver_id),
        }
    }
}

/// Chat message as pushed to clients and returned by the history endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: i64,
    pub timestamp: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub receiver_id: Option<i64>,
    pub message: String,
    pub is_deleted: bool,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    pub is_delivered: bool,
    pub is_seen: bool,
}

impl MessagePayload {
    pub fn from_message(message: &Message, sender_name: impl Into<String>) -> Self {
        Self {
            id: message.id,
            timestamp: message.created_at.to_rfc3339(),
            sender_id: message.sender_id,
            sender_name: sender_name.into(),
            receiver_id: message.receiver_id,
            message: message.text.clone(),
            is_deleted: message.is_deleted,
            is_edited: message.is_edited,
            edited_at: message.edited_at.map(|t| t.to_rfc3339()),
            is_delivered: message.is_delivered,
            is_seen: message.is_seen,
        }
    }
}

/// Outbound event frames, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A newly routed chat message
    Message(MessagePayload),
    /// A message's text was changed by its sender
    Edit {
        message_id: i64,
        new_text: String,
        is_edited: bool,
    },
    /// A message was deleted by its sender
    Delete { message_id: i64 },
    /// A private message was marked seen by its receiver
    Seen { message_id: i64 },
}

impl ServerEvent {
    /// Get the event name for logging
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Message(_) => "message",
            ServerEvent::Edit { .. } => "edit",
            ServerEvent::Delete { .. } => "delete",
            ServerEvent::Seen { .. } => "seen",
        }
    }
}

/// Why the server closed a connection. Each reason maps to its own close
/// code so clients can tell a supersession apart from a network error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Unknown or no longer active session token
    InvalidSession,
    /// The user logged in again elsewhere
    Superseded,
    /// The session was ended by an explicit logout
    LoggedOut,
    /// No inbound traffic within the configured idle timeout
    IdleTimeout,
}

impl CloseReason {
    /// WebSocket close code sent with the close frame.
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::InvalidSession => 1008,
            CloseReason::LoggedOut => 4000,
            CloseReason::Superseded => 4001,
            CloseReason::IdleTimeout => 4002,
        }
    }

    /// Human-readable close reason sent with the close frame.
    pub fn reason(&self) -> &'static str {
        match self {
            CloseReason::InvalidSession => "invalid session",
            CloseReason::LoggedOut => "logged out",
            CloseReason::Superseded => "superseded by new session",
            CloseReason::IdleTimeout => "idle timeout",
        }
    }
}

/// Item queued on a connection's outbound channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    Close(CloseReason),
}
