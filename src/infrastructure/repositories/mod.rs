//! Repository Implementations
//!
//! Implementations of the domain repository traits.
//!
//! ## Backends
//!
//! - **PostgreSQL** (`Pg*Repository`) - durable storage via `sqlx`
//! - **In-memory** (`InMemoryStore`) - process-local tables for development
//!   and tests
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use chat_relay::infrastructure::repositories::Repositories;
//!
//! let repos = Repositories::postgres(pool);
//! let user = repos.users.find_by_id(1).await?;
//! ```

pub mod memory_store;
pub mod message_repository;
pub mod session_repository;
pub mod user_repository;

use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::{MessageRepository, SessionRepository, UserRepository};

pub use memory_store::InMemoryStore;
pub use message_repository::PgMessageRepository;
pub use session_repository::PgSessionRepository;
pub use user_repository::PgUserRepository;

/// The persistent store as seen by the services: one handle per entity.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    /// Repositories backed by a PostgreSQL pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            messages: Arc::new(PgMessageRepository::new(pool)),
        }
    }

    /// Repositories sharing one in-memory store.
    pub fn in_memory(store: InMemoryStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            sessions: Arc::new(store.clone()),
            messages: Arc::new(store),
        }
    }
}
