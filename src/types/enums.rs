//! Shared enum types that map directly to live API string values and codes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{close_codes, events};
use crate::error::LiveError;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A topic the client can subscribe to.
///
/// The declaration order is the order channels appear in outbound frames.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Orders,
    Positions,
    Account,
    Dca,
    Transfers,
    Fx,
    /// Requires an accompanying uppercase symbol list.
    Quotes,
    Baskets,
}

impl Channel {
    /// Every channel the server knows.
    pub const ALL: [Channel; 8] = [
        Self::Orders,
        Self::Positions,
        Self::Account,
        Self::Dca,
        Self::Transfers,
        Self::Fx,
        Self::Quotes,
        Self::Baskets,
    ];

    /// Channels the server subscribes every connection to on its own.
    pub const SERVER_DEFAULTS: [Channel; 5] = [
        Self::Orders,
        Self::Positions,
        Self::Account,
        Self::Dca,
        Self::Transfers,
    ];

    /// Wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Positions => "positions",
            Self::Account => "account",
            Self::Dca => "dca",
            Self::Transfers => "transfers",
            Self::Fx => "fx",
            Self::Quotes => "quotes",
            Self::Baskets => "baskets",
        }
    }

    /// Whether subscriptions on this channel are keyed by symbol.
    pub fn takes_symbols(self) -> bool {
        matches!(self, Self::Quotes)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = LiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LiveError::InvalidArgument(format!("unknown channel: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Frame type
// ---------------------------------------------------------------------------

/// The `type` field of an inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    /// A domain event for consumers.
    Event,
    /// Connection-level traffic (heartbeat, token lifecycle, welcome).
    System,
    /// Acknowledgement of a client request.
    Ack,
    /// An error reported by the server.
    Error,
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Observable state of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket and no retry pending.
    #[default]
    Disconnected,
    /// A handshake is in progress.
    Connecting,
    /// The socket is open and subscriptions have been replayed.
    Connected,
    /// Waiting on a backoff timer before the next attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Whether the state is [`ConnectionState::Connected`].
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Device type
// ---------------------------------------------------------------------------

/// Platform reported in the `device_type` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ios,
    Android,
    #[default]
    Web,
}

impl DeviceType {
    /// Query-string value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Web => "web",
        }
    }
}

// ---------------------------------------------------------------------------
// Server close codes
// ---------------------------------------------------------------------------

/// Application close codes the server sends before dropping a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerCloseCode {
    Unauthorized,
    TokenExpired,
    /// Fatal: no automatic reconnect.
    UserNotFound,
    /// Fatal: no automatic reconnect.
    AccountInactive,
    RateLimited,
    ServerShutdown,
}

impl ServerCloseCode {
    /// Construct from the numeric close code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            close_codes::UNAUTHORIZED => Some(Self::Unauthorized),
            close_codes::TOKEN_EXPIRED => Some(Self::TokenExpired),
            close_codes::USER_NOT_FOUND => Some(Self::UserNotFound),
            close_codes::ACCOUNT_INACTIVE => Some(Self::AccountInactive),
            close_codes::RATE_LIMITED => Some(Self::RateLimited),
            close_codes::SERVER_SHUTDOWN => Some(Self::ServerShutdown),
            _ => None,
        }
    }

    /// The numeric close code.
    pub fn code(self) -> u16 {
        match self {
            Self::Unauthorized => close_codes::UNAUTHORIZED,
            Self::TokenExpired => close_codes::TOKEN_EXPIRED,
            Self::UserNotFound => close_codes::USER_NOT_FOUND,
            Self::AccountInactive => close_codes::ACCOUNT_INACTIVE,
            Self::RateLimited => close_codes::RATE_LIMITED,
            Self::ServerShutdown => close_codes::SERVER_SHUTDOWN,
        }
    }
}

// ---------------------------------------------------------------------------
// Event kind
// ---------------------------------------------------------------------------

/// Known event names from the server's catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventKind {
    // system
    Connected,
    Heartbeat,
    TokenExpiring,
    TokenRefreshed,
    ServerShutdown,
    // domain
    QuoteUpdated,
    OrderCreated,
    OrderStatus,
    OrderFill,
    OrderCancelled,
    PositionCreated,
    PositionUpdated,
    PositionClosed,
    CashChanged,
    BuyingPowerChanged,
    AccountStatusChanged,
    DcaExecuted,
    DcaFailed,
    DcaStatusChanged,
    TransferComplete,
    TransferFailed,
    FxRateUpdated,
    BasketValueChanged,
}

impl EventKind {
    /// Parse an event name. Returns `None` for names outside the catalogue.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            events::CONNECTED | events::WELCOME => Self::Connected,
            events::HEARTBEAT => Self::Heartbeat,
            events::TOKEN_EXPIRING => Self::TokenExpiring,
            events::TOKEN_REFRESHED => Self::TokenRefreshed,
            events::SERVER_SHUTDOWN => Self::ServerShutdown,
            events::QUOTE_UPDATED => Self::QuoteUpdated,
            "order_created" => Self::OrderCreated,
            "order_status" => Self::OrderStatus,
            "order_fill" => Self::OrderFill,
            "order_cancelled" => Self::OrderCancelled,
            "position_created" => Self::PositionCreated,
            "position_updated" => Self::PositionUpdated,
            "position_closed" => Self::PositionClosed,
            "cash_changed" => Self::CashChanged,
            "buying_power_changed" => Self::BuyingPowerChanged,
            "account_status_changed" => Self::AccountStatusChanged,
            "dca_executed" => Self::DcaExecuted,
            "dca_failed" => Self::DcaFailed,
            "dca_status_changed" => Self::DcaStatusChanged,
            "transfer_complete" => Self::TransferComplete,
            "transfer_failed" => Self::TransferFailed,
            "fx_rate_updated" => Self::FxRateUpdated,
            "basket_value_changed" => Self::BasketValueChanged,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether the event is connection-level traffic handled inside the client.
    pub fn is_system(self) -> bool {
        matches!(
            self,
            Self::Connected
                | Self::Heartbeat
                | Self::TokenExpiring
                | Self::TokenRefreshed
                | Self::ServerShutdown
        )
    }
}
