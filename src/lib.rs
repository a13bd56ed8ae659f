//! # live-ws
//!
//! A Rust client for a brokerage's real-time WebSocket API: live quotes,
//! order and position updates, account balances, transfers, recurring-buy
//! (DCA) executions, FX rates and basket values.
//!
//! The client keeps one authenticated socket alive for as long as the
//! consumer wants it: it answers heartbeats, refreshes its credential before
//! the server revokes it, reconnects with jittered backoff, and replays the
//! desired subscriptions on every new socket.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use live_ws::LiveClient;
//! use live_ws::auth::{Credential, StaticCredentialProvider};
//! use live_ws::types::Channel;
//!
//! #[tokio::main]
//! async fn main() -> live_ws::Result<()> {
//!     let credential = Credential::new("your-access-token", Utc::now() + Duration::hours(1));
//!     let client = LiveClient::builder(StaticCredentialProvider::new(credential)).build();
//!     client.connect().await?;
//!     // Subscriptions made while disconnected are replayed on connect.
//!     let _ = client.subscribe(&[Channel::Quotes], &["AAPL"]).await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod constants;
pub mod error;
pub mod types;
pub mod ws;

/// Re-export the main client types at crate root for convenience.
pub use ws::client::LiveClient;
pub use ws::config::{LiveClientBuilder, LiveConfig};
/// Re-export the error type and Result alias.
pub use error::{LiveError, Result};
