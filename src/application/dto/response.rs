//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::{Deserialize, Serialize};

use crate::domain::{Session, User};

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub user_name: String,
    pub email: String,
    pub profile_pic: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
            email: user.email,
            profile_pic: user.profile_pic,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Login response: the session token plus the caller's profile
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

impl LoginResponse {
    pub fn new(user: User, session: Session) -> Self {
        Self {
            token: session.token,
            user: user.into(),
        }
    }
}

/// Result of marking a conversation seen
#[derive(Debug, Serialize, Deserialize)]
pub struct SeenResponse {
    pub updated: usize,
}
