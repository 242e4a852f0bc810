//! Health Check Handlers
//!
//! `/health` and `/health/live` answer as long as the process serves
//! requests. `/health/ready` also checks the message store and reports how
//! many sockets the relay is carrying.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::startup::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub store: StoreCheck,
    pub active_connections: usize,
    pub online_users: usize,
}

/// Store reachability as seen by the relay
#[derive(Debug, Serialize)]
pub struct StoreCheck {
    pub backend: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "alive",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 200 while the store answers, 503 otherwise
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(&state).await;
    let status_code = if store.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = ReadinessResponse {
        status: if store.reachable { "ready" } else { "unavailable" },
        store,
        active_connections: state.gateway.connection_count(),
        online_users: state.gateway.online_users().len(),
    };

    (status_code, Json(response))
}

async fn check_store(state: &AppState) -> StoreCheck {
    let backend = state.settings.store.backend.to_string();
    // The memory backend lives in-process
    let Some(db) = &state.db else {
        return StoreCheck {
            backend,
            reachable: true,
            error: None,
        };
    };

    match sqlx::query("SELECT 1").execute(db).await {
        Ok(_) => StoreCheck {
            backend,
            reachable: true,
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check: store unreachable");
            StoreCheck {
                backend,
                reachable: false,
                error: Some(e.to_string()),
            }
        }
    }
}
