//! # Domain Layer
//!
//! The domain layer contains the core data model of the chat relay.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Users, sessions and messages together with the
//!   repository traits that make up the persistent store contract
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate their own state transitions

pub mod entities;

// Re-export commonly used types
pub use entities::*;
