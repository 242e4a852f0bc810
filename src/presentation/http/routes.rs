//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .merge(protected_routes(state.clone()))
        // WebSocket endpoint; the token is checked after the upgrade
        .route("/ws/{token}", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Routes that require `Authorization: Bearer <session token>`
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/logout", post(handlers::auth::logout))
        .route("/change-password", post(handlers::auth::change_password))
        .route("/messages", get(handlers::message::get_public_messages))
        .route(
            "/messages/private/{user_id}",
            get(handlers::message::get_private_messages),
        )
        .route(
            "/messages/{message_id}",
            patch(handlers::message::edit_message).delete(handlers::message::delete_message),
        )
        .route("/messages/seen/{user_id}", post(handlers::message::mark_seen))
        .route("/users/online", get(handlers::user::get_online_users))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
