//! Session entity and repository trait.
//!
//! Maps to the `active_sessions` table. A session binds an opaque bearer
//! token to a user for the duration of one login; the same token keys the
//! user's live WebSocket connection in the gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::AppError;

/// Represents one active login.
///
/// Maps to the `active_sessions` table:
/// - token: VARCHAR(64) PRIMARY KEY
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - started_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token (UUID v4 text)
    pub token: String,

    pub user_id: i64,

    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with a freshly generated token.
    pub fn new(user_id: i64) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            user_id,
            started_at: Utc::now(),
        }
    }
}

/// Repository trait for Session data access operations.
///
/// The store alone does not enforce one session per user; callers go through
/// `SessionService`, which serializes logins per user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a new session.
    async fn create(&self, session: &Session) -> Result<(), AppError>;

    /// Find the session belonging to a user, if any.
    async fn find_by_user_id(&self, user_id: i64) -> Result<Option<Session>, AppError>;

    /// Find a session by its token.
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>, AppError>;

    /// Delete a session. Deleting an unknown token is not an error.
    async fn delete(&self, token: &str) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sessions_get_distinct_tokens() {
        let a = Session::new(1);
        let b = Session::new(1);
        assert_ne!(a.token, b.token);
        assert_eq!(a.user_id, 1);
    }
}
