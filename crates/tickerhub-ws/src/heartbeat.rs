//! Heartbeat management for WebSocket connections.
//!
//! Tracks inbound activity and outstanding pings. Any inbound frame counts
//! as proof of life, so exchanges that answer an application ping with a
//! text frame and exchanges that answer a protocol ping are treated alike.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

/// Heartbeat manager for WebSocket connection health.
pub struct HeartbeatManager {
    /// Idle time after which a ping is sent.
    interval_ms: u64,
    /// How long a ping may stay unanswered.
    timeout_ms: u64,
    last_ping: RwLock<Option<DateTime<Utc>>>,
    last_message: RwLock<DateTime<Utc>>,
    waiting_for_reply: RwLock<bool>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
            last_ping: RwLock::new(None),
            last_message: RwLock::new(Utc::now()),
            waiting_for_reply: RwLock::new(false),
        }
    }

    /// Reset heartbeat state (called on connection).
    pub fn reset(&self) {
        *self.last_ping.write() = None;
        *self.last_message.write() = Utc::now();
        *self.waiting_for_reply.write() = false;
    }

    /// Record that a ping was sent.
    pub fn record_ping(&self) {
        let now = Utc::now();
        *self.last_ping.write() = Some(now);
        *self.waiting_for_reply.write() = true;
        debug!(time = %now, "Recorded ping");
    }

    /// Record that any frame was received.
    pub fn record_message(&self) {
        let now = Utc::now();
        *self.last_message.write() = now;

        let mut waiting = self.waiting_for_reply.write();
        if *waiting {
            *waiting = false;
            if let Some(ping_time) = *self.last_ping.read() {
                debug!(rtt_ms = (now - ping_time).num_milliseconds(), "Ping answered");
            }
        }
    }

    /// True when a ping has gone unanswered for longer than the timeout.
    pub fn is_timed_out(&self) -> bool {
        if !*self.waiting_for_reply.read() {
            return false;
        }

        match *self.last_ping.read() {
            Some(ping_time) => (Utc::now() - ping_time).num_milliseconds() > self.timeout_ms as i64,
            None => false,
        }
    }

    pub fn time_since_last_message_ms(&self) -> i64 {
        (Utc::now() - *self.last_message.read()).num_milliseconds()
    }

    /// Check if we should send a heartbeat.
    pub fn should_send_heartbeat(&self) -> bool {
        if *self.waiting_for_reply.read() {
            return false;
        }
        self.time_since_last_message_ms() >= self.interval_ms as i64
    }

    /// Wait for the next heartbeat check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(Duration::from_millis((self.interval_ms / 2).max(1))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_initial_state() {
        let hb = HeartbeatManager::new(20_000, 10_000);
        assert!(!hb.is_timed_out());
        assert!(!hb.should_send_heartbeat());
    }

    #[test]
    fn test_any_message_answers_ping() {
        let hb = HeartbeatManager::new(20_000, 10_000);

        hb.record_ping();
        assert!(*hb.waiting_for_reply.read());
        assert!(!hb.should_send_heartbeat());

        hb.record_message();
        assert!(!*hb.waiting_for_reply.read());
    }

    #[test]
    fn test_unanswered_ping_times_out() {
        let hb = HeartbeatManager::new(0, 0);
        hb.record_ping();
        std::thread::sleep(Duration::from_millis(5));
        assert!(hb.is_timed_out());

        hb.reset();
        assert!(!hb.is_timed_out());
    }

    #[test]
    fn test_idle_connection_needs_ping() {
        let hb = HeartbeatManager::new(0, 10_000);
        assert!(hb.should_send_heartbeat());
    }
}
