//! HTTP API
//!
//! REST endpoints for accounts, message history and message transitions.

pub mod handlers;
pub mod routes;
