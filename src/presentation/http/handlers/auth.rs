//! Authentication Handlers

use axum::{extract::State, http::StatusCode, Extension, Json};
use validator::Validate;

use crate::application::dto::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UserResponse,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let user = state
        .auth
        .register(&body.user_name, &body.email, &body.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Login with credentials. Any session the user already had is superseded.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    body.validate().map_err(validation_error)?;

    let (user, session) = state.auth.login(&body.email, &body.password).await?;

    Ok(Json(LoginResponse::new(user, session)))
}

/// End the caller's session and close its connection
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<StatusCode, AppError> {
    state.auth.logout(&auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change the caller's password; the session stays open
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    body.validate().map_err(validation_error)?;

    state
        .auth
        .change_password(auth.user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
