//! WebSocket Gateway
//!
//! The connection registry: maps session tokens to live connections and
//! fans events out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::messages::{CloseReason, Outbound, ServerEvent};
use crate::infrastructure::metrics;

/// A live, writable connection. Owned by the gateway while registered and
/// by the socket task that created it.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    token: String,
    user_id: i64,
    user_name: String,
    sender: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
}

impl Connection {
    pub fn new(
        token: impl Into<String>,
        user_id: i64,
        user_name: impl Into<String>,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            user_id,
            user_name: user_name.into(),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Queue an event for the writer task. Returns `false` if the writer is
    /// gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(Outbound::Event(event)).is_ok()
    }

    /// Queue a close frame. Events queued earlier are still written first.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.sender.send(Outbound::Close(reason));
    }

    /// Flag the connection as closed. Returns `true` only for the first
    /// caller, which owns the cleanup.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Registry of live connections keyed by session token.
///
/// Structural changes take the write lock. Fan-out copies the targets under
/// the read lock and sends after releasing it.
#[derive(Default)]
pub struct Gateway {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its token.
    ///
    /// An existing entry for the same token is replaced and closed.
    pub fn register(&self, connection: Arc<Connection>) {
        let replaced = {
            let mut connections = self.connections.write();
            let replaced = connections.insert(connection.token.clone(), connection.clone());
            metrics::set_websocket_connections(connections.len());
            replaced
        };

        if let Some(old) = replaced {
            tracing::warn!(
                user_id = old.user_id,
                connection_id = %old.id,
                "Duplicate registration for token, closing previous connection"
            );
            old.close(CloseReason::Superseded);
        }

        tracing::info!(
            user_id = connection.user_id,
            connection_id = %connection.id,
            "Connection registered"
        );
    }

    /// Remove the entry holding this connection. The caller may no longer
    /// know the token, so entries are matched by connection id.
    pub fn unregister(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        let removed = {
            let mut connections = self.connections.write();
            let token = connections
                .iter()
                .find(|(_, conn)| conn.id == connection_id)
                .map(|(token, _)| token.clone())?;
            let removed = connections.remove(&token);
            metrics::set_websocket_connections(connections.len());
            removed
        };

        if let Some(conn) = &removed {
            tracing::info!(
                user_id = conn.user_id,
                connection_id = %conn.id,
                "Connection unregistered"
            );
        }

        removed
    }

    /// Remove the connection registered under `token` and close it with
    /// `reason`. Returns whether a connection was evicted.
    pub fn evict(&self, token: &str, reason: CloseReason) -> bool {
        let removed = {
            let mut connections = self.connections.write();
            let removed = connections.remove(token);
            metrics::set_websocket_connections(connections.len());
            removed
        };

        match removed {
            Some(conn) => {
                conn.close(reason);
                tracing::info!(
                    user_id = conn.user_id,
                    connection_id = %conn.id,
                    reason = reason.reason(),
                    "Connection evicted"
                );
                true
            }
            None => false,
        }
    }

    /// Send to the connection registered under `token`. Offline recipients
    /// are not an error; returns whether the event was queued.
    pub fn send_to(&self, token: &str, event: ServerEvent) -> bool {
        let target = self.connections.read().get(token).cloned();
        match target {
            Some(conn) => Self::deliver(&conn, event),
            None => false,
        }
    }

    /// Send to whichever connection currently represents `user_id`.
    pub fn send_to_user(&self, user_id: i64, event: ServerEvent) -> bool {
        let targets: Vec<Arc<Connection>> = self
            .connections
            .read()
            .values()
            .filter(|conn| conn.user_id == user_id)
            .cloned()
            .collect();

        let mut delivered = false;
        for conn in targets {
            delivered |= Self::deliver(&conn, event.clone());
        }
        delivered
    }

    /// Push `event` to every registered connection. A failed send is logged
    /// and skipped. Returns the number of connections reached.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let targets: Vec<Arc<Connection>> = self.connections.read().values().cloned().collect();

        targets
            .iter()
            .filter(|conn| Self::deliver(conn, event.clone()))
            .count()
    }

    /// Whether any registered connection belongs to `user_id`.
    pub fn is_online(&self, user_id: i64) -> bool {
        self.connections
            .read()
            .values()
            .any(|conn| conn.user_id == user_id)
    }

    /// `(user_id, user_name)` of every connected user, ordered by user id.
    pub fn online_users(&self) -> Vec<(i64, String)> {
        let mut users: Vec<(i64, String)> = self
            .connections
            .read()
            .values()
            .map(|conn| (conn.user_id, conn.user_name.clone()))
            .collect();
        users.sort_by_key(|(id, _)| *id);
        users.dedup_by_key(|(id, _)| *id);
        users
    }

    /// Get connection count
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    fn deliver(conn: &Connection, event: ServerEvent) -> bool {
        // cleanup already started; the entry is about to go
        if conn.is_closed() {
            return false;
        }

        let name = event.event_name();
        if conn.send(event) {
            return true;
        }

        metrics::record_fanout_failure();
        tracing::warn!(
            user_id = conn.user_id,
            connection_id = %conn.id,
            event = name,
            "Dropping event for closed connection"
        );
        false
    }
}
