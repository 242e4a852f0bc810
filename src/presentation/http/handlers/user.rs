//! User Handlers

use axum::{extract::State, Json};

use crate::application::dto::UserResponse;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Users with a live connection
pub async fn get_online_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.sessions.online_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
