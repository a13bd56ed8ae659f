//! The live WebSocket client and its components.
//!
//! [`client`] holds the [`LiveClient`](client::LiveClient) handle and the
//! background task that owns all connection state. The other modules are the
//! pieces that task drives:
//!
//! - [`connection`]: one physical socket and its receive loop
//! - [`codec`]: inbound envelope decoding and outbound frame encoding
//! - [`supervisor`]: connection state, close-code policy, reconnect backoff
//! - [`heartbeat`]: liveness deadline tracking
//! - [`token`]: credential storage and refresh bookkeeping
//! - [`subscription`]: the desired subscription set and its deltas
//! - [`dispatcher`]: fan-out to consumer streams
//!
//! ## Limits
//!
//! - Symbols are only meaningful on the `quotes` channel
//! - The server keeps no subscription state across sockets

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod subscription;
pub mod supervisor;
pub mod token;
