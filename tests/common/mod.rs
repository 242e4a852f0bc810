//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use chat_relay::config::Settings;
use chat_relay::presentation::websocket::{Connection, Outbound};
use chat_relay::startup::{build_router, AppState};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Test application over a fresh in-memory store
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// A registered and logged-in user
pub struct LoggedIn {
    pub user_id: i64,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let settings = Settings::defaults().expect("default settings");
        let state = AppState::in_memory(settings);
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated request with an optional JSON body
    pub async fn request_auth(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token));
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        self.send(request.unwrap()).await
    }

    /// Register `name` and log in, returning the session token
    pub async fn login_new_user(&self, name: &str) -> LoggedIn {
        let email = format!("{name}@example.com");
        let response = self
            .post_json(
                "/register",
                &json!({"user_name": name, "email": email, "password": "Password123!"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        self.login(&email).await
    }

    /// Log in an already registered user
    pub async fn login(&self, email: &str) -> LoggedIn {
        let response = self
            .post_json("/login", &json!({"email": email, "password": "Password123!"}))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        LoggedIn {
            user_id: body["user"]["id"].as_i64().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Attach a stand-in connection for `user`, as the WebSocket handler would
    pub async fn connect(
        &self,
        user: &LoggedIn,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = self.state.sessions.attach(&user.token, tx).await.unwrap();
        (conn, rx)
    }

    /// Like [`connect`](Self::connect), but replays the public history first
    /// the way the WebSocket handler does on upgrade
    pub async fn connect_with_history(
        &self,
        user: &LoggedIn,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .messages
            .replay_history(&user.token, &tx)
            .await
            .unwrap();
        let conn = self.state.sessions.attach(&user.token, tx).await.unwrap();
        (conn, rx)
    }
}

/// Read a response body as JSON
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Everything queued on a connection so far
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
