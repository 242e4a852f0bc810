//! Data Transfer Objects
//!
//! DTOs for API request/response serialization.

pub mod request;
pub mod response;

pub use request::{ChangePasswordRequest, EditMessageRequest, LoginRequest, RegisterRequest};
pub use response::{LoginResponse, SeenResponse, UserResponse};
