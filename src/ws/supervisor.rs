//! Reconnect supervision: connection state, close-code policy, and backoff.
//!
//! ```text
//!  disconnected ──start──▶ connecting ──ok──▶ connected
//!        ▲                    │  ▲                │
//!        │                  fail │ timer      close / heartbeat timeout
//!        │                    ▼  │                │
//!        └──── fatal ─────  reconnecting ◀────────┘
//! ```
//!
//! Any state goes to `disconnected` on an explicit stop. Close codes 4003 and
//! 4004 halt there without retrying; 4001/4002 retry after a credential
//! refresh; 4005 retries on a longer schedule; everything else retries on the
//! standard schedule.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::types::enums::{ConnectionState, ServerCloseCode};
use crate::ws::config::LiveConfig;

// ---------------------------------------------------------------------------
// Close classification
// ---------------------------------------------------------------------------

/// How a close should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// Network loss, server shutdown, heartbeat timeout, unknown codes.
    Transient,
    /// 4001/4002: refresh the credential before reconnecting.
    Auth,
    /// 4005: reconnect with elongated backoff.
    RateLimited,
    /// 4003/4004: stop and wait for the consumer.
    Fatal,
}

/// Classify a close by its code. `None` means no close frame was received.
pub fn classify_close(code: Option<u16>) -> CloseClass {
    match code.and_then(ServerCloseCode::from_code) {
        Some(ServerCloseCode::Unauthorized | ServerCloseCode::TokenExpired) => CloseClass::Auth,
        Some(ServerCloseCode::UserNotFound | ServerCloseCode::AccountInactive) => {
            CloseClass::Fatal
        }
        Some(ServerCloseCode::RateLimited) => CloseClass::RateLimited,
        Some(ServerCloseCode::ServerShutdown) | None => CloseClass::Transient,
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Jittered exponential backoff.
///
/// The un-jittered delay for attempt `n` is `min(initial * 2^n, cap)`; the
/// returned delay is that value scaled by a random factor in
/// `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    rate_limited_initial: Duration,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff schedule.
    pub fn new(
        initial: Duration,
        max: Duration,
        rate_limited_initial: Duration,
        jitter: f64,
    ) -> Self {
        Self {
            initial,
            max: max.max(initial),
            rate_limited_initial,
            jitter: jitter.clamp(0.0, 0.9),
            attempt: 0,
        }
    }

    /// Build from the client configuration.
    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new(
            config.reconnect_delay_initial,
            config.reconnect_delay_max,
            config.rate_limited_delay_initial,
            config.reconnect_jitter,
        )
    }

    /// Un-jittered delay for the given attempt number.
    pub fn expected_delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        let (initial, cap) = if rate_limited {
            (self.rate_limited_initial, self.max.max(self.rate_limited_initial))
        } else {
            (self.initial, self.max)
        };
        let factor = 2u32.saturating_pow(attempt.min(31));
        initial.saturating_mul(factor).min(cap)
    }

    /// Delay before the next attempt. Advances the attempt counter.
    pub fn next_delay(&mut self, rate_limited: bool) -> Duration {
        let expected = self.expected_delay(self.attempt, rate_limited);
        self.attempt = self.attempt.saturating_add(1);
        if self.jitter == 0.0 {
            return expected;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        expected.mul_f64(factor)
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Start over from the initial delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Relative jitter in use.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// What to do after a connection ended or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Wait `delay`, then connect again, first refreshing the credential if asked.
    Retry {
        delay: Duration,
        refresh_credential: bool,
    },
    /// Stay disconnected until the consumer restarts the client.
    Halt,
}

/// Sole writer of [`ConnectionState`].
#[derive(Debug)]
pub struct Supervisor {
    state: watch::Sender<ConnectionState>,
    backoff: Backoff,
    /// Set by a 4005 close; held until the next successful connect.
    rate_limited: bool,
}

impl Supervisor {
    /// Create a supervisor in the `disconnected` state.
    pub fn new(backoff: Backoff) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state,
            backoff,
            rate_limited: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether retries are on the rate-limited schedule.
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    /// A read-only observer of the state.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// `disconnected|reconnecting → connecting`.
    pub fn on_connecting(&mut self) {
        self.transition(ConnectionState::Connecting);
    }

    /// `connecting → connected`. Resets the backoff schedule.
    pub fn on_connected(&mut self) {
        self.backoff.reset();
        self.rate_limited = false;
        self.transition(ConnectionState::Connected);
    }

    /// `connecting → reconnecting` after a failed attempt. Stays on the
    /// rate-limited schedule if the last close was a 4005.
    pub fn on_connect_failed(&mut self) -> Duration {
        let delay = self.backoff.next_delay(self.rate_limited);
        self.transition(ConnectionState::Reconnecting);
        delay
    }

    /// `connected → reconnecting|disconnected` after the socket ended.
    pub fn on_closed(&mut self, class: CloseClass) -> ReconnectAction {
        match class {
            CloseClass::Fatal => {
                self.backoff.reset();
                self.rate_limited = false;
                self.transition(ConnectionState::Disconnected);
                ReconnectAction::Halt
            }
            CloseClass::Auth | CloseClass::RateLimited | CloseClass::Transient => {
                self.rate_limited = class == CloseClass::RateLimited;
                let delay = self.backoff.next_delay(self.rate_limited);
                self.transition(ConnectionState::Reconnecting);
                ReconnectAction::Retry {
                    delay,
                    refresh_credential: class == CloseClass::Auth,
                }
            }
        }
    }

    /// `* → disconnected` on explicit stop.
    pub fn on_stopped(&mut self) {
        self.backoff.reset();
        self.rate_limited = false;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::info!(from = %state, to = %next, "Connection state changed");
            *state = next;
            true
        });
        if !changed {
            tracing::trace!(state = %next, "Connection state unchanged");
        }
    }
}
