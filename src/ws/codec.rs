//! Wire codec for the live WebSocket protocol.
//!
//! Inbound text frames decode into an [`Envelope`]:
//!
//! ```json
//! { "id": "…", "type": "event", "event": "quote_updated",
//!   "timestamp": "2024-05-01T14:30:00.123456", "data": { … } }
//! ```
//!
//! Outbound control frames are built as [`OutboundFrame`] values and encoded
//! to JSON. Unknown inbound fields are ignored, and `timestamp` values without
//! an offset are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LiveError, Result};
use crate::types::enums::{Channel, EventKind, FrameType};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// The decoded form of every inbound frame. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    /// Server-assigned frame ID (empty when omitted).
    #[serde(default)]
    pub id: String,
    /// Frame category.
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    /// Event name, if the frame carries one.
    #[serde(default)]
    pub event: Option<String>,
    /// Server timestamp in UTC. Defaults to the receive instant when absent.
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Untyped payload.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// The event name, if any.
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// The event name parsed against the known catalogue.
    pub fn kind(&self) -> Option<EventKind> {
        self.event_name().and_then(EventKind::from_name)
    }

    /// Whether this envelope carries the given event name.
    pub fn is(&self, name: &str) -> bool {
        self.event_name() == Some(name)
    }

    /// Decode the payload into a typed shape.
    ///
    /// Failures are reported as [`LiveError::Decode`] naming the event so a
    /// caller can log and drop the single frame.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data).map_err(|source| LiveError::Decode {
            event: self.event.clone().unwrap_or_default(),
            source,
        })
    }

    /// Read a duration in seconds from `data[key]`, accepting numbers or
    /// numeric strings.
    pub fn data_seconds(&self, key: &str) -> Option<f64> {
        let secs = match self.data.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        (secs.is_finite() && secs >= 0.0).then_some(secs)
    }
}

/// Decode one inbound text frame.
pub fn decode_frame(text: &str) -> Result<Envelope> {
    Ok(serde_json::from_str(text)?)
}

/// Parse a server timestamp.
///
/// Accepts RFC 3339 with an offset, or a naive ISO-8601 datetime (with `T` or
/// a space separator, optional fractional seconds) which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<DateTime<Utc>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw).map_err(de::Error::custom),
        None => Ok(Utc::now()),
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A client-to-server control frame. Built fresh per send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// `{"type":"subscribe","channels":[…],"symbols":[…]}`
    Subscribe {
        channels: Vec<Channel>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        symbols: Vec<String>,
    },
    /// `{"type":"unsubscribe","channels":[…],"symbols":[…]}`
    Unsubscribe {
        channels: Vec<Channel>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        symbols: Vec<String>,
    },
    /// `{"type":"pong"}`
    Pong,
    /// `{"type":"refresh_token","token":"…"}`
    RefreshToken { token: String },
}

impl OutboundFrame {
    /// Short name for logging. Never includes the token.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Pong => "pong",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
