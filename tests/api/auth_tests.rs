//! Authentication API Tests

use axum::http::StatusCode;
use chat_relay::presentation::websocket::{CloseReason, Outbound};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{drain, json_body, TestApp};

#[tokio::test]
async fn test_register_with_valid_data() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/register",
            &json!({"user_name": "alice", "email": "alice@example.com", "password": "Password123!"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["user_name"], "alice");
    assert!(body.get("pass_hash").is_none());
}

#[tokio::test]
async fn test_register_with_invalid_email_fails() {
    let app = TestApp::new();

    let response = app
        .post_json(
            "/register",
            &json!({"user_name": "alice", "email": "not-an-email", "password": "Password123!"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.login_new_user("alice").await;

    let response = app
        .post_json(
            "/register",
            &json!({"user_name": "other", "email": "alice@example.com", "password": "Password123!"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_with_wrong_password_fails() {
    let app = TestApp::new();
    app.login_new_user("alice").await;

    let response = app
        .post_json(
            "/login",
            &json!({"email": "alice@example.com", "password": "wrong-password"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_login_evicts_first_connection() {
    let app = TestApp::new();
    let first = app.login_new_user("alice").await;
    let (_conn, mut rx) = app.connect(&first).await;

    let second = app.login("alice@example.com").await;

    assert_ne!(first.token, second.token);
    assert_eq!(drain(&mut rx), vec![Outbound::Close(CloseReason::Superseded)]);

    let stale = app.request_auth("GET", "/messages", &first.token, None).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);
    let fresh = app.request_auth("GET", "/messages", &second.token, None).await;
    assert_eq!(fresh.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_closes_connection_and_invalidates_token() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let (_conn, mut rx) = app.connect(&alice).await;

    let response = app.request_auth("POST", "/logout", &alice.token, None).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(drain(&mut rx), vec![Outbound::Close(CloseReason::LoggedOut)]);
    let after = app.request_auth("POST", "/logout", &alice.token, None).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_bearer() {
    let app = TestApp::new();

    assert_eq!(app.get("/messages").await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.request_auth("GET", "/users/online", "garbage", None)
            .await
            .status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_online_users_lists_connected_only() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    let (_conn, _rx) = app.connect(&alice).await;

    let response = app
        .request_auth("GET", "/users/online", &bob.token, None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![alice.user_id]);
}

#[tokio::test]
async fn test_change_password_keeps_session_and_swaps_credentials() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;

    let response = app
        .request_auth(
            "POST",
            "/change-password",
            &alice.token,
            Some(&json!({"old_password": "Password123!", "new_password": "NewPassword456!"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let still_valid = app.request_auth("GET", "/messages", &alice.token, None).await;
    assert_eq!(still_valid.status(), StatusCode::OK);

    let old = app
        .post_json(
            "/login",
            &json!({"email": "alice@example.com", "password": "Password123!"}),
        )
        .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = app
        .post_json(
            "/login",
            &json!({"email": "alice@example.com", "password": "NewPassword456!"}),
        )
        .await;
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_rejects_wrong_old_password() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;

    let response = app
        .request_auth(
            "POST",
            "/change-password",
            &alice.token,
            Some(&json!({"old_password": "not-my-password", "new_password": "NewPassword456!"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Credentials unchanged
    app.login("alice@example.com").await;
}

#[tokio::test]
async fn test_change_password_requires_session() {
    let app = TestApp::new();

    let response = app
        .request_auth(
            "POST",
            "/change-password",
            "garbage",
            Some(&json!({"old_password": "Password123!", "new_password": "NewPassword456!"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
