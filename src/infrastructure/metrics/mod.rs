//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge
//! - Routed chat messages by kind (public, private)
//! - Message state transitions by kind (edit, delete, seen)
//! - Sessions superseded by a newer login
//! - Per-connection fan-out failures

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections gauge
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of registered WebSocket connections",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Chat messages routed, labelled by "public" or "private"
pub static MESSAGES_ROUTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_routed_total", "Total number of chat messages routed")
            .namespace("chat_relay"),
        &["kind"],
    )
    .expect("Failed to create MESSAGES_ROUTED_TOTAL metric")
});

/// Committed message transitions, labelled "edit", "delete" or "seen"
pub static MESSAGE_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "message_transitions_total",
            "Total number of committed message state transitions",
        )
        .namespace("chat_relay"),
        &["transition"],
    )
    .expect("Failed to create MESSAGE_TRANSITIONS_TOTAL metric")
});

/// Logins that evicted an earlier session of the same user
pub static SESSIONS_SUPERSEDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "sessions_superseded_total",
            "Total number of sessions replaced by a newer login",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create SESSIONS_SUPERSEDED_TOTAL metric")
});

/// Sends that failed because the connection's writer had already gone away
pub static FANOUT_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "fanout_failures_total",
            "Total number of outbound events dropped by closed connections",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create FANOUT_FAILURES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(MESSAGES_ROUTED_TOTAL.clone()))
        .expect("Failed to register MESSAGES_ROUTED_TOTAL");
    registry
        .register(Box::new(MESSAGE_TRANSITIONS_TOTAL.clone()))
        .expect("Failed to register MESSAGE_TRANSITIONS_TOTAL");
    registry
        .register(Box::new(SESSIONS_SUPERSEDED_TOTAL.clone()))
        .expect("Failed to register SESSIONS_SUPERSEDED_TOTAL");
    registry
        .register(Box::new(FANOUT_FAILURES_TOTAL.clone()))
        .expect("Failed to register FANOUT_FAILURES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to publish the registry size
pub fn set_websocket_connections(count: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(count as i64);
}

/// Helper to count a routed message
pub fn record_message_routed(private: bool) {
    let kind = if private { "private" } else { "public" };
    MESSAGES_ROUTED_TOTAL.with_label_values(&[kind]).inc();
}

/// Helper to count a committed transition
pub fn record_transition(transition: &str) {
    MESSAGE_TRANSITIONS_TOTAL
        .with_label_values(&[transition])
        .inc();
}

/// Helper to count a superseded session
pub fn record_session_superseded() {
    SESSIONS_SUPERSEDED_TOTAL.inc();
}

/// Helper to count a dropped outbound event
pub fn record_fanout_failure() {
    FANOUT_FAILURES_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*WEBSOCKET_CONNECTIONS_ACTIVE;
        let _ = &*MESSAGES_ROUTED_TOTAL;
    }

    #[test]
    fn test_record_message_routed() {
        record_message_routed(true);
        record_message_routed(false);
        let metrics = gather_metrics();
        assert!(metrics.contains("chat_relay_messages_routed_total"));
    }

    #[test]
    fn test_record_transition() {
        record_transition("edit");
        let metrics = gather_metrics();
        assert!(metrics.contains("chat_relay_message_transitions_total"));
    }
}
