//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema. Users are owned by the
//! registration flow; the delivery core only reads identity and display
//! fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a registered user account.
///
/// Maps to the `users` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - user_name: VARCHAR(64) NOT NULL
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - pass_hash: VARCHAR(255) NOT NULL
/// - profile_pic: TEXT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Display name shown next to messages
    pub user_name: String,

    /// Login email (unique)
    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub pass_hash: String,

    /// Public path of the profile picture, if one was uploaded
    pub profile_pic: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub pass_hash: String,
}

/// Repository trait for User data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find a user by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Create a new user.
    ///
    /// Returns `AppError::Conflict` if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// Replace the stored password hash.
    ///
    /// Returns `AppError::NotFound` if the user does not exist.
    async fn update_password(&self, user_id: i64, pass_hash: &str) -> Result<(), AppError>;
}
