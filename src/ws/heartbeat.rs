//! Heartbeat liveness tracking.
//!
//! The server sends a `heartbeat` system frame every interval; the client
//! answers each with a `pong` and expects the next heartbeat within
//! `interval + grace`. The monitor only tracks deadlines; the client's event
//! loop sleeps until [`deadline`](HeartbeatMonitor::deadline) and treats the
//! wake-up as a dead connection.

use std::time::Duration;

use tokio::time::Instant;

/// Liveness state for the current connection.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    grace: Duration,
    last_heartbeat_at: Option<Instant>,
    deadline: Option<Instant>,
}

impl HeartbeatMonitor {
    /// Create a disarmed monitor.
    pub fn new(interval: Duration, grace: Duration) -> Self {
        Self {
            interval,
            grace,
            last_heartbeat_at: None,
            deadline: None,
        }
    }

    /// Start watching a freshly opened connection.
    pub fn arm(&mut self, now: Instant) {
        self.last_heartbeat_at = None;
        self.deadline = self.window_end(now);
    }

    /// Stop watching; [`deadline`](Self::deadline) returns `None` afterwards.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Adopt the interval advertised by the server and restart the window.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval;
        if self.deadline.is_some() {
            self.deadline = self.window_end(now);
        }
    }

    /// Record a heartbeat and push the deadline out by one window.
    pub fn on_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat_at = Some(now);
        self.deadline = self.window_end(now);
    }

    /// Interval plus grace, saturating.
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_add(self.grace)
    }

    /// Current heartbeat interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the connection will be declared dead, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// When the last heartbeat arrived on this connection.
    pub fn last_heartbeat_at(&self) -> Option<Instant> {
        self.last_heartbeat_at
    }

    /// Whether the window has elapsed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// `None` when the window ends beyond what the clock can represent, in
    /// which case the connection is never declared dead.
    fn window_end(&self, now: Instant) -> Option<Instant> {
        now.checked_add(self.timeout())
    }
}
