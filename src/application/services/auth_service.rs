//! Authentication Service
//!
//! Handles account registration, credential checks and logout. Session
//! lifecycle itself belongs to [`SessionService`].

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::session_service::{SessionError, SessionService};
use crate::domain::{NewUser, Session, User, UserRepository};
use crate::shared::error::AppError;

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already exists")]
    EmailExists,

    #[error("Old password incorrect")]
    WrongPassword,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Invalid email or password".into())
            }
            AuthError::EmailExists => AppError::Conflict("Email already registered".into()),
            AuthError::WrongPassword => AppError::BadRequest("Old password incorrect".into()),
            AuthError::Session(e) => e.into(),
            AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Store(e) => e,
        }
    }
}

/// Credential adapter in front of the session enforcer.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<SessionService>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, sessions: Arc<SessionService>) -> Self {
        Self { users, sessions }
    }

    /// Create an account. Emails are unique.
    pub async fn register(
        &self,
        user_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }

        let pass_hash = self.hash_password(password)?;
        let user = self
            .users
            .create(NewUser {
                user_name: user_name.to_string(),
                email: email.to_string(),
                pass_hash,
            })
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AuthError::EmailExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Verify credentials and start a session, superseding any session the
    /// user already had.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, Session), AuthError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &user.pass_hash)? {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.sessions.establish(user.id).await?;
        Ok((user, session))
    }

    /// End the session behind `token`.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.terminate(token).await?;
        Ok(())
    }

    /// Replace the password of `user_id` after checking the current one.
    /// The session stays valid.
    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Session(SessionError::UserNotFound))?;

        if !self.verify_password(old_password, &user.pass_hash)? {
            return Err(AuthError::WrongPassword);
        }

        let pass_hash = self.hash_password(new_password)?;
        self.users.update_password(user.id, &pass_hash).await?;

        tracing::info!(user_id = user.id, "Password changed");
        Ok(())
    }

    /// Hash a password using Argon2id
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify password against hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionRepository;
    use crate::infrastructure::repositories::InMemoryStore;
    use crate::presentation::websocket::Gateway;

    fn service() -> (InMemoryStore, AuthService) {
        let store = InMemoryStore::new();
        let sessions = Arc::new(SessionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(Gateway::new()),
        ));
        let auth = AuthService::new(Arc::new(store.clone()), sessions);
        (store, auth)
    }

    #[tokio::test]
    async fn test_password_is_hashed() {
        let (_store, auth) = service();
        let user = auth
            .register("alice", "alice@example.com", "hunter22")
            .await
            .unwrap();

        assert_ne!(user.pass_hash, "hunter22");
        assert!(user.pass_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let (_store, auth) = service();
        auth.register("alice", "alice@example.com", "hunter22")
            .await
            .unwrap();

        assert!(matches!(
            auth.register("alice2", "alice@example.com", "other").await,
            Err(AuthError::EmailExists)
        ));
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let (_store, auth) = service();
        auth.register("alice", "alice@example.com", "hunter22")
            .await
            .unwrap();

        assert!(matches!(
            auth.login("alice@example.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));

        let (user, session) = auth.login("alice@example.com", "hunter22").await.unwrap();
        assert_eq!(session.user_id, user.id);
    }

    #[tokio::test]
    async fn test_relogin_replaces_session() {
        let (store, auth) = service();
        auth.register("alice", "alice@example.com", "hunter22")
            .await
            .unwrap();

        let (_, first) = auth.login("alice@example.com", "hunter22").await.unwrap();
        let (user, second) = auth.login("alice@example.com", "hunter22").await.unwrap();

        assert_ne!(first.token, second.token);
        assert!(store.find_by_token(&first.token).await.unwrap().is_none());
        assert_eq!(store.session_count_for(user.id), 1);

        auth.logout(&second.token).await.unwrap();
        assert_eq!(store.session_count_for(user.id), 0);
    }

    #[tokio::test]
    async fn test_change_password_swaps_credentials() {
        let (store, auth) = service();
        let user = auth
            .register("alice", "alice@example.com", "hunter22")
            .await
            .unwrap();
        let (_, session) = auth.login("alice@example.com", "hunter22").await.unwrap();

        auth.change_password(user.id, "hunter22", "correct-horse")
            .await
            .unwrap();

        // The current session survives the change
        assert!(store.find_by_token(&session.token).await.unwrap().is_some());
        assert!(matches!(
            auth.login("alice@example.com", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));
        auth.login("alice@example.com", "correct-horse")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let (_store, auth) = service();
        let user = auth
            .register("alice", "alice@example.com", "hunter22")
            .await
            .unwrap();

        let err = auth
            .change_password(user.id, "not-it", "correct-horse")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::WrongPassword));
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));

        auth.login("alice@example.com", "hunter22").await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password_store_failure_surfaces() {
        let (store, hasher) = service();
        let user = User {
            id: 1,
            user_name: "alice".into(),
            email: "alice@example.com".into(),
            pass_hash: hasher.hash_password("hunter22").unwrap(),
            profile_pic: None,
            created_at: chrono::Utc::now(),
        };

        let mut users = crate::domain::MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        users
            .expect_update_password()
            .returning(|_, _| Err(AppError::Internal("disk full".into())));

        let sessions = Arc::new(SessionService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(Gateway::new()),
        ));
        let auth = AuthService::new(Arc::new(users), sessions);

        assert!(matches!(
            auth.change_password(1, "hunter22", "correct-horse").await,
            Err(AuthError::Store(AppError::Internal(_)))
        ));
    }
}
