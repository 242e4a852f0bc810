//! WebSocket Gateway
//!
//! Real-time delivery via WebSocket connections keyed by session token.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod session;

pub use gateway::{Connection, Gateway};
pub use handler::ws_handler;
pub use messages::{CloseReason, InboundMessage, MessagePayload, Outbound, ServerEvent};
pub use session::SessionState;
