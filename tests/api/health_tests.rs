//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::{json_body, TestApp};

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new();

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_memory_store() {
    let app = TestApp::new();

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"]["backend"], "memory");
    assert_eq!(body["store"]["reachable"], true);
    assert!(body["store"].get("error").is_none());
    assert_eq!(body["active_connections"], 0);
    assert_eq!(body["online_users"], 0);
}

#[tokio::test]
async fn test_readiness_counts_live_connections() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let (_conn, _rx) = app.connect(&alice).await;

    let body = json_body(app.get("/health/ready").await).await;

    assert_eq!(body["active_connections"], 1);
    assert_eq!(body["online_users"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new();
    let user = app.login_new_user("metrics").await;
    let (_conn, _rx) = app.connect(&user).await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat_relay_websocket_connections_active"));
}
