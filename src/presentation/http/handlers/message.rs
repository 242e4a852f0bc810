//! Message Handlers
//!
//! History queries and sender-side transitions. New messages arrive over the
//! WebSocket only.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use validator::Validate;

use crate::application::dto::{EditMessageRequest, SeenResponse};
use crate::presentation::middleware::AuthUser;
use crate::presentation::websocket::MessagePayload;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Get public message history
pub async fn get_public_messages(
    State(state): State<AppState>,
) -> Result<Json<Vec<MessagePayload>>, AppError> {
    let messages = state.messages.public_history().await?;
    Ok(Json(messages))
}

/// Get the private conversation between the caller and `user_id`
pub async fn get_private_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<MessagePayload>>, AppError> {
    let messages = state.messages.private_history(&auth.token, user_id).await?;
    Ok(Json(messages))
}

/// Edit a message the caller sent
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<i64>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<MessagePayload>, AppError> {
    body.validate().map_err(validation_error)?;

    let message = state
        .messages
        .edit(&auth.token, message_id, &body.new_text)
        .await?;

    Ok(Json(state.messages.to_payload(message).await?))
}

/// Delete a message the caller sent
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<i64>,
) -> Result<Json<MessagePayload>, AppError> {
    let message = state.messages.delete(&auth.token, message_id).await?;
    Ok(Json(state.messages.to_payload(message).await?))
}

/// Mark everything `user_id` sent to the caller as seen
pub async fn mark_seen(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<SeenResponse>, AppError> {
    let updated = state.messages.mark_seen(&auth.token, user_id).await?;
    Ok(Json(SeenResponse { updated }))
}
