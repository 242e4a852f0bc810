//! Authentication Middleware
//!
//! Session token validation for protected routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    /// The session token the request was made with
    pub token: String,
}

/// Authentication middleware that resolves `Authorization: Bearer <token>`
/// to an active session
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    // Check for Bearer token
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?
        .to_string();

    let session = state.sessions.resolve(&token).await?;

    request.extensions_mut().insert(AuthUser {
        user_id: session.user_id,
        token,
    });

    Ok(next.run(request).await)
}
