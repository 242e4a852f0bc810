//! WebSocket Session State

use std::time::{Duration, Instant};

use uuid::Uuid;

/// Per-socket state owned by the reader loop.
#[derive(Debug)]
pub struct SessionState {
    pub connection_id: Uuid,
    pub user_id: i64,
    pub frames_received: u64,
    pub last_activity: Instant,
}

impl SessionState {
    pub fn new(connection_id: Uuid, user_id: i64) -> Self {
        Self {
            connection_id,
            user_id,
            frames_received: 0,
            last_activity: Instant::now(),
        }
    }

    /// Record an inbound frame.
    pub fn touch(&mut self) {
        self.frames_received += 1;
        self.last_activity = Instant::now();
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() >= timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_counts_frames() {
        let mut state = SessionState::new(Uuid::new_v4(), 1);
        state.touch();
        state.touch();
        assert_eq!(state.frames_received, 2);
        assert!(!state.is_idle(Duration::from_secs(60)));
        assert!(state.is_idle(Duration::ZERO));
    }
}
