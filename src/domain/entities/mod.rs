//! # Domain Entities
//!
//! Core domain entities persisted by the store.
//!
//! - **User**: registered account (identity and display fields)
//! - **Session**: one active login, keyed by an opaque token
//! - **Message**: public or private chat message with delivery state
//!
//! Each entity has an associated repository trait implemented in the
//! infrastructure layer (PostgreSQL and in-memory backends).

mod message;
mod session;
mod user;

pub use message::{Message, MessageFilter, MessageRepository, NewMessage, DELETED_PLACEHOLDER};
pub use session::{Session, SessionRepository};
pub use user::{NewUser, User, UserRepository};

#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use session::MockSessionRepository;
#[cfg(test)]
pub use user::MockUserRepository;
