//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, credential checks, logout
//! - **SessionService**: One-session-per-user enforcement and connection lifecycle
//! - **MessageService**: Message routing and edit/delete/seen propagation

pub mod auth_service;
pub mod message_service;
pub mod session_service;

pub use auth_service::{AuthError, AuthService};
pub use message_service::{MessageError, MessageService};
pub use session_service::{SessionError, SessionService};
