//! Session Service
//!
//! Enforces one active session per user and ties sessions to live
//! connections in the gateway.
//!
//! Every check-then-act on "does this user already have a session" runs
//! under a per-user async mutex, so concurrent logins for the same user
//! converge on exactly one session.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use crate::domain::{Session, SessionRepository, User, UserRepository};
use crate::infrastructure::metrics;
use crate::presentation::websocket::{CloseReason, Connection, Gateway, Outbound};
use crate::shared::error::AppError;

/// Session service errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid or inactive session")]
    InvalidSession,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidSession => AppError::Unauthorized("Invalid session token".into()),
            SessionError::UserNotFound => AppError::NotFound("User not found".into()),
            SessionError::Store(e) => e,
        }
    }
}

/// Session enforcer and connection lifecycle owner.
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<Gateway>,
    login_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<Gateway>,
    ) -> Self {
        Self {
            sessions,
            users,
            gateway,
            login_locks: DashMap::new(),
        }
    }

    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.login_locks.entry(user_id).or_default().clone()
    }

    /// Start a new session for `user_id`, superseding any existing one.
    ///
    /// The previous session's connection is closed and its record deleted
    /// before the new session is written. If that write fails the user is
    /// left without a session and the error is returned.
    pub async fn establish(&self, user_id: i64) -> Result<Session, SessionError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(previous) = self.sessions.find_by_user_id(user_id).await? {
            let was_online = self.gateway.evict(&previous.token, CloseReason::Superseded);
            self.sessions.delete(&previous.token).await?;
            metrics::record_session_superseded();
            tracing::info!(
                user_id = user_id,
                was_online = was_online,
                "Previous session superseded"
            );
        }

        let session = Session::new(user_id);
        if let Err(e) = self.sessions.create(&session).await {
            tracing::error!(user_id = user_id, error = %e, "Failed to persist new session");
            return Err(e.into());
        }

        tracing::info!(user_id = user_id, "Session established");
        Ok(session)
    }

    /// Look up the active session for `token`.
    pub async fn resolve(&self, token: &str) -> Result<Session, SessionError> {
        self.sessions
            .find_by_token(token)
            .await?
            .ok_or(SessionError::InvalidSession)
    }

    /// Register a live connection for `token`.
    ///
    /// The token is checked again under the user's lock so a connection can
    /// never be registered for a session that a concurrent login has just
    /// superseded. Unknown tokens fail before the gateway is touched.
    pub async fn attach(
        &self,
        token: &str,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Result<Arc<Connection>, SessionError> {
        let session = self.resolve(token).await?;
        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        let lock = self.user_lock(user.id);
        let _guard = lock.lock().await;

        if self.sessions.find_by_token(token).await?.is_none() {
            return Err(SessionError::InvalidSession);
        }

        let connection = Arc::new(Connection::new(token, user.id, user.user_name, sender));
        self.gateway.register(connection.clone());
        Ok(connection)
    }

    /// Clean up after a connection went away.
    ///
    /// Safe to call from several paths; only the first call does the work.
    /// The session is ended only if this connection was still the one
    /// registered for its token. Returns whether this call performed the
    /// cleanup.
    pub async fn detach(&self, connection: &Connection) -> Result<bool, SessionError> {
        if !connection.mark_closed() {
            return Ok(false);
        }

        let lock = self.user_lock(connection.user_id());
        let _guard = lock.lock().await;

        let was_registered = self.gateway.unregister(connection.id()).is_some();
        if was_registered {
            self.sessions.delete(connection.token()).await?;
        }

        tracing::info!(
            user_id = connection.user_id(),
            connection_id = %connection.id(),
            session_ended = was_registered,
            "Connection detached"
        );
        Ok(true)
    }

    /// End the session for `token` (explicit logout). Idempotent.
    pub async fn terminate(&self, token: &str) -> Result<(), SessionError> {
        let Some(session) = self.sessions.find_by_token(token).await? else {
            self.gateway.evict(token, CloseReason::LoggedOut);
            return Ok(());
        };

        let lock = self.user_lock(session.user_id);
        let _guard = lock.lock().await;
        self.sessions.delete(token).await?;
        self.gateway.evict(token, CloseReason::LoggedOut);
        tracing::info!(user_id = session.user_id, "Session terminated");
        Ok(())
    }

    /// Users with a registered connection, with their stored profile.
    pub async fn online_users(&self) -> Result<Vec<User>, SessionError> {
        let mut users = Vec::new();
        for (user_id, _) in self.gateway.online_users() {
            if let Some(user) = self.users.find_by_id(user_id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }
}
