//! Constants for the live WebSocket API.
//!
//! Contains the default endpoint, server close codes, event names, and the
//! default timing values used by [`LiveConfig`](crate::ws::config::LiveConfig).
//! They are exported for advanced usage and tests.

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Default base URL for the live API. The socket lives at `<base>/ws`.
pub const WS_BASE_URL: &str = "wss://api.example.com/api/v1";

/// Path segment appended to the base URL.
pub const WS_PATH: &str = "ws";

// ---------------------------------------------------------------------------
// Close codes
// ---------------------------------------------------------------------------

/// Server close codes, see [`ServerCloseCode`](crate::types::ServerCloseCode).
pub mod close_codes {
    /// Credential rejected.
    pub const UNAUTHORIZED: u16 = 4001;
    /// Credential expired.
    pub const TOKEN_EXPIRED: u16 = 4002;
    /// User not found (fatal).
    pub const USER_NOT_FOUND: u16 = 4003;
    /// Account inactive (fatal).
    pub const ACCOUNT_INACTIVE: u16 = 4004;
    /// Too many connections or messages.
    pub const RATE_LIMITED: u16 = 4005;
    /// Server is going away.
    pub const SERVER_SHUTDOWN: u16 = 4006;
    /// Normal closure, used for local shutdown.
    pub const NORMAL: u16 = 1000;
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names carried in the envelope `event` field.
pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const WELCOME: &str = "welcome";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const TOKEN_EXPIRING: &str = "token_expiring";
    pub const TOKEN_REFRESHED: &str = "token_refreshed";
    pub const SERVER_SHUTDOWN: &str = "server_shutdown";
    pub const QUOTE_UPDATED: &str = "quote_updated";
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default timing and capacity values.
pub mod defaults {
    /// Heartbeat interval assumed until the server advertises one (seconds).
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
    /// Largest server-advertised heartbeat interval accepted (seconds).
    pub const MAX_HEARTBEAT_INTERVAL_SECS: u64 = 3_600;
    /// Margin added to the heartbeat interval before declaring the socket dead (seconds).
    pub const HEARTBEAT_GRACE_SECS: u64 = 10;
    /// Bound on the WebSocket handshake (seconds).
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    /// First reconnect delay for transient failures (milliseconds).
    pub const RECONNECT_DELAY_INITIAL_MS: u64 = 1_000;
    /// Upper bound on the un-jittered reconnect delay (milliseconds).
    pub const RECONNECT_DELAY_MAX_MS: u64 = 30_000;
    /// First reconnect delay after a rate-limit close (milliseconds).
    pub const RATE_LIMITED_DELAY_INITIAL_MS: u64 = 10_000;
    /// Relative jitter applied to each reconnect delay.
    pub const RECONNECT_JITTER: f64 = 0.2;
    /// A credential this close to expiry is treated as expired (seconds).
    pub const CREDENTIAL_EXPIRY_MARGIN_SECS: i64 = 30;
    /// Broadcast capacity for each consumer stream.
    pub const CHANNEL_CAPACITY: usize = 1024;
}
