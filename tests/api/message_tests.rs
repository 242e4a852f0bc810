//! Message API Tests

use axum::http::StatusCode;
use chat_relay::presentation::websocket::{InboundMessage, Outbound, ServerEvent};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{drain, json_body, TestApp};

#[tokio::test]
async fn test_public_history_in_order() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    for text in ["first", "second"] {
        app.state
            .messages
            .send(&alice.token, InboundMessage::public(text))
            .await
            .unwrap();
    }

    let response = app.request_auth("GET", "/messages", &alice.token, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let texts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(body[0]["sender_name"], "alice");
}

#[tokio::test]
async fn test_private_history_is_scoped_to_the_pair() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    let carol = app.login_new_user("carol").await;
    app.state
        .messages
        .send(&alice.token, InboundMessage::private("to bob", bob.user_id))
        .await
        .unwrap();
    app.state
        .messages
        .send(&alice.token, InboundMessage::private("to carol", carol.user_id))
        .await
        .unwrap();

    let response = app
        .request_auth(
            "GET",
            &format!("/messages/private/{}", alice.user_id),
            &bob.token,
            None,
        )
        .await;

    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["message"], "to bob");
    assert_eq!(body[0]["is_delivered"], false);
}

#[tokio::test]
async fn test_edit_endpoint_updates_and_broadcasts() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    let (_conn, mut bob_rx) = app.connect(&bob).await;
    let sent = app
        .state
        .messages
        .send(&alice.token, InboundMessage::public("helo"))
        .await
        .unwrap();
    drain(&mut bob_rx);

    let response = app
        .request_auth(
            "PATCH",
            &format!("/messages/{}", sent.id),
            &alice.token,
            Some(&json!({"new_text": "hello"})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "hello");
    assert_eq!(body["is_edited"], true);
    assert_eq!(
        drain(&mut bob_rx),
        vec![Outbound::Event(ServerEvent::Edit {
            message_id: sent.id,
            new_text: "hello".into(),
            is_edited: true,
        })]
    );
}

#[tokio::test]
async fn test_edit_by_non_sender_is_forbidden() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    let sent = app
        .state
        .messages
        .send(&alice.token, InboundMessage::public("mine"))
        .await
        .unwrap();

    let response = app
        .request_auth(
            "PATCH",
            &format!("/messages/{}", sent.id),
            &bob.token,
            Some(&json!({"new_text": "yours"})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_edit_unknown_message_is_not_found() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;

    let response = app
        .request_auth(
            "PATCH",
            "/messages/999",
            &alice.token,
            Some(&json!({"new_text": "x"})),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_then_edit_conflicts() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let sent = app
        .state
        .messages
        .send(&alice.token, InboundMessage::public("oops"))
        .await
        .unwrap();
    let uri = format!("/messages/{}", sent.id);

    let response = app.request_auth("DELETE", &uri, &alice.token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "This message was deleted");
    assert_eq!(body["is_deleted"], true);

    let response = app
        .request_auth("PATCH", &uri, &alice.token, Some(&json!({"new_text": "again"})))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_mark_seen_endpoint() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    for text in ["one", "two"] {
        app.state
            .messages
            .send(&alice.token, InboundMessage::private(text, bob.user_id))
            .await
            .unwrap();
    }
    let uri = format!("/messages/seen/{}", alice.user_id);

    let response = app.request_auth("POST", &uri, &bob.token, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["updated"], 2);

    let response = app.request_auth("POST", &uri, &bob.token, None).await;
    assert_eq!(json_body(response).await["updated"], 0);
}

#[tokio::test]
async fn test_private_message_to_connected_receiver() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    let carol = app.login_new_user("carol").await;
    let (_a, mut alice_rx) = app.connect(&alice).await;
    let (_b, mut bob_rx) = app.connect(&bob).await;
    let (_c, mut carol_rx) = app.connect(&carol).await;

    let payload = app
        .state
        .messages
        .send(&alice.token, InboundMessage::parse(&format!(
            r#"{{"message": "psst", "receiver_id": {}}}"#,
            bob.user_id
        )))
        .await
        .unwrap();

    assert!(payload.is_delivered);
    let expected = vec![Outbound::Event(ServerEvent::Message(payload))];
    assert_eq!(drain(&mut bob_rx), expected);
    assert_eq!(drain(&mut alice_rx), expected);
    assert!(drain(&mut carol_rx).is_empty());
}

#[tokio::test]
async fn test_disconnect_ends_session() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let (conn, _rx) = app.connect(&alice).await;

    assert!(app.state.sessions.detach(&conn).await.unwrap());

    let response = app.request_auth("GET", "/messages", &alice.token, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.state.gateway.connection_count(), 0);
}

#[tokio::test]
async fn test_connect_replays_history_before_live_messages() {
    let app = TestApp::new();
    let alice = app.login_new_user("alice").await;
    let bob = app.login_new_user("bob").await;
    let (_a, _alice_rx) = app.connect(&alice).await;

    let earlier = app
        .state
        .messages
        .send(&alice.token, InboundMessage::public("before bob"))
        .await
        .unwrap();
    // Private traffic is not part of the replay
    app.state
        .messages
        .send(&alice.token, InboundMessage::parse(&format!(
            r#"{{"message": "psst", "receiver_id": {}}}"#,
            bob.user_id
        )))
        .await
        .unwrap();

    let (_b, mut bob_rx) = app.connect_with_history(&bob).await;
    let live = app
        .state
        .messages
        .send(&alice.token, InboundMessage::public("after bob"))
        .await
        .unwrap();

    assert_eq!(
        drain(&mut bob_rx),
        vec![
            Outbound::Event(ServerEvent::Message(earlier)),
            Outbound::Event(ServerEvent::Message(live)),
        ]
    );
}
