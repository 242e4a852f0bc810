//! In-Memory Store
//!
//! Process-local implementation of the user, session and message
//! repositories. Selected with `store.backend = "memory"`; also the backend
//! used by the test suites. Contents are lost on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::{
    Message, MessageFilter, MessageRepository, NewMessage, NewUser, Session, SessionRepository,
    User, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    next_user_id: i64,
    sessions: HashMap<String, Session>,
    messages: BTreeMap<i64, Message>,
    next_message_id: i64,
}

/// Shared in-memory tables. Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently stored for `user_id`.
    pub fn session_count_for(&self, user_id: i64) -> usize {
        self.tables
            .read()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write();
        if tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict("Email already registered".into()));
        }

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            user_name: user.user_name,
            email: user.email,
            pass_hash: user.pass_hash,
            profile_pic: None,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_password(&self, user_id: i64, pass_hash: &str) -> Result<(), AppError> {
        match self.tables.write().users.get_mut(&user_id) {
            Some(user) => {
                user.pass_hash = pass_hash.to_string();
                Ok(())
            }
            None => Err(AppError::NotFound("User not found".into())),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn create(&self, session: &Session) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        if tables.sessions.contains_key(&session.token) {
            return Err(AppError::Conflict("Session token already exists".into()));
        }
        tables.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<Session>, AppError> {
        Ok(self
            .tables
            .read()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.started_at)
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError> {
        Ok(self.tables.read().sessions.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<(), AppError> {
        self.tables.write().sessions.remove(token);
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: NewMessage) -> Result<Message, AppError> {
        let mut tables = self.tables.write();
        tables.next_message_id += 1;
        let created = Message {
            id: tables.next_message_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            text: message.text,
            created_at: Utc::now(),
            is_deleted: false,
            is_edited: false,
            edited_at: None,
            is_delivered: false,
            is_seen: false,
        };
        tables.messages.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.tables.read().messages.get(&id).cloned())
    }

    async fn update(&self, message: &Message) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        match tables.messages.get_mut(&message.id) {
            Some(stored) => {
                *stored = message.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Message {} not found", message.id))),
        }
    }

    async fn query(&self, filter: MessageFilter) -> Result<Vec<Message>, AppError> {
        let mut found: Vec<Message> = self
            .tables
            .read()
            .messages
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }
}
