//! Error types for the `live-ws` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, LiveError>`.
//!
//! [`LiveError`] covers:
//! - **Transport errors**: WebSocket handshake and protocol failures, connect timeouts
//! - **JSON errors**: Frame encode/decode failures
//! - **Decode errors**: A recognised event whose payload does not match its shape
//! - **Credential errors**: Failures reported by the external auth capability
//! - **Local state errors**: Sending while disconnected, using a stopped client
//! - **Invalid arguments**: Client-side validation errors

use std::time::Duration;

/// All possible errors produced by the `live-ws` client.
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    /// Failed to serialize or deserialize a JSON frame.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A WebSocket-level error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An error building the endpoint URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The WebSocket handshake did not complete in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A frame could not be sent because no connection is open.
    #[error("not connected")]
    NotConnected,

    /// The credential-refresh capability failed to produce a credential.
    #[error("credential refresh failed: {0}")]
    Credential(String),

    /// A recognised event carried a payload that did not match its shape.
    #[error("failed to decode `{event}` payload: {source}")]
    Decode {
        /// The event name from the envelope.
        event: String,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },

    /// The background client task is no longer running.
    #[error("client task has shut down")]
    ClientClosed,

    /// The caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LiveError>;
