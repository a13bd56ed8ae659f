//! Enumerations and event payload types for the live API.
//!
//! ## Organization
//!
//! - [`enums`]: Channels, frame types, connection state, close codes, event names
//! - [`events`]: Typed domain event payloads decoded from envelopes
//!
//! Everything is re-exported at the module root.

pub mod enums;
pub mod events;

pub use enums::*;
pub use events::*;
