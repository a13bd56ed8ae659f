//! Desired subscription tracking.
//!
//! The [`SubscriptionManager`] is the client-side record of what should be
//! subscribed, independent of whether a socket is open. Incremental calls
//! produce a frame for the delta only; after a reconnect the whole set is
//! replayed because the server keeps no subscription state across sockets.
//!
//! Symbols only apply to [`Channel::Quotes`] and are always trimmed and
//! uppercased before comparison or transmission.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{LiveError, Result};
use crate::types::enums::Channel;
use crate::ws::codec::OutboundFrame;

// ---------------------------------------------------------------------------
// Subscription set
// ---------------------------------------------------------------------------

/// Mapping from channel to its symbol set (empty for symbol-less channels).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    channels: BTreeMap<Channel, BTreeSet<String>>,
}

impl SubscriptionSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the channel is subscribed.
    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.contains_key(&channel)
    }

    /// Symbols tracked for a channel.
    pub fn symbols(&self, channel: Channel) -> Option<&BTreeSet<String>> {
        self.channels.get(&channel)
    }

    /// Subscribed channels in wire order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.keys().copied()
    }

    /// `(channel, symbols)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &BTreeSet<String>)> {
        self.channels.iter().map(|(c, s)| (*c, s))
    }

    /// Number of subscribed channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl FromIterator<(Channel, BTreeSet<String>)> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = (Channel, BTreeSet<String>)>>(iter: I) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}

/// Trim and uppercase symbols, dropping blanks and duplicates.
pub fn normalize_symbols<S: AsRef<str>>(symbols: &[S]) -> BTreeSet<String> {
    symbols
        .iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owner of the desired [`SubscriptionSet`].
#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    desired: SubscriptionSet,
    server_defaults: BTreeSet<Channel>,
}

impl SubscriptionManager {
    /// Create a manager whose desired set starts as the server's automatic
    /// subscriptions.
    pub fn new(server_defaults: &[Channel]) -> Self {
        let server_defaults: BTreeSet<Channel> = server_defaults
            .iter()
            .copied()
            .filter(|c| !c.takes_symbols())
            .collect();
        let desired = server_defaults
            .iter()
            .map(|c| (*c, BTreeSet::new()))
            .collect();
        Self {
            desired,
            server_defaults,
        }
    }

    /// The authoritative desired set.
    pub fn desired(&self) -> &SubscriptionSet {
        &self.desired
    }

    /// Merge channels (and quote symbols) into the desired set.
    ///
    /// Returns the `subscribe` frame for whatever was not already desired, or
    /// `None` when the call changed nothing.
    pub fn subscribe(
        &mut self,
        channels: &[Channel],
        symbols: Option<&[String]>,
    ) -> Result<Option<OutboundFrame>> {
        if channels.is_empty() {
            return Err(LiveError::InvalidArgument("no channels given".into()));
        }
        let symbols = normalize_symbols(symbols.unwrap_or_default());
        if channels.contains(&Channel::Quotes) && symbols.is_empty() {
            return Err(LiveError::InvalidArgument(
                "the quotes channel requires at least one symbol".into(),
            ));
        }

        let mut added_channels = BTreeSet::new();
        let mut added_symbols = BTreeSet::new();
        for &channel in channels {
            let is_new = !self.desired.channels.contains_key(&channel);
            let entry = self.desired.channels.entry(channel).or_default();
            if channel.takes_symbols() {
                let fresh: Vec<String> = symbols.difference(entry).cloned().collect();
                if !fresh.is_empty() {
                    added_channels.insert(channel);
                }
                entry.extend(fresh.iter().cloned());
                added_symbols.extend(fresh);
            } else if is_new {
                added_channels.insert(channel);
            }
        }

        if added_channels.is_empty() {
            return Ok(None);
        }
        Ok(Some(OutboundFrame::Subscribe {
            channels: added_channels.into_iter().collect(),
            symbols: added_symbols.into_iter().collect(),
        }))
    }

    /// Remove channels (or individual quote symbols) from the desired set.
    ///
    /// With `symbols`, only those symbols are removed from symbol-keyed
    /// channels, and the channel goes once its last symbol does. Without
    /// `symbols`, the channels are removed outright. Returns the
    /// `unsubscribe` frame for exactly what was removed.
    pub fn unsubscribe(
        &mut self,
        channels: &[Channel],
        symbols: Option<&[String]>,
    ) -> Option<OutboundFrame> {
        let symbols = symbols
            .map(normalize_symbols)
            .filter(|s| !s.is_empty());

        let mut removed_channels = BTreeSet::new();
        let mut removed_symbols = BTreeSet::new();
        for &channel in channels {
            let Some(current) = self.desired.channels.get_mut(&channel) else {
                continue;
            };
            match (&symbols, channel.takes_symbols()) {
                (Some(wanted), true) => {
                    let gone: Vec<String> = current.intersection(wanted).cloned().collect();
                    if gone.is_empty() {
                        continue;
                    }
                    for symbol in &gone {
                        current.remove(symbol);
                    }
                    if current.is_empty() {
                        self.desired.channels.remove(&channel);
                    }
                    removed_channels.insert(channel);
                    removed_symbols.extend(gone);
                }
                _ => {
                    if let Some(previous) = self.desired.channels.remove(&channel) {
                        removed_symbols.extend(previous);
                    }
                    removed_channels.insert(channel);
                }
            }
        }

        if removed_channels.is_empty() {
            return None;
        }
        Some(OutboundFrame::Unsubscribe {
            channels: removed_channels.into_iter().collect(),
            symbols: removed_symbols.into_iter().collect(),
        })
    }

    /// Frames that bring a fresh connection in line with the desired set.
    ///
    /// The server already subscribes its default channels, so those are not
    /// requested again; defaults the consumer removed are unsubscribed
    /// instead. Everything else is sent in one `subscribe` frame.
    pub fn resubscribe_frames(&self) -> Vec<OutboundFrame> {
        let mut frames = Vec::with_capacity(2);

        let mut channels = Vec::new();
        let mut symbols = BTreeSet::new();
        for (channel, channel_symbols) in self.desired.iter() {
            if self.server_defaults.contains(&channel) {
                continue;
            }
            channels.push(channel);
            symbols.extend(channel_symbols.iter().cloned());
        }
        if !channels.is_empty() {
            frames.push(OutboundFrame::Subscribe {
                channels,
                symbols: symbols.into_iter().collect(),
            });
        }

        let dropped: Vec<Channel> = self
            .server_defaults
            .iter()
            .copied()
            .filter(|c| !self.desired.contains(*c))
            .collect();
        if !dropped.is_empty() {
            frames.push(OutboundFrame::Unsubscribe {
                channels: dropped,
                symbols: Vec::new(),
            });
        }

        frames
    }

    /// Channels the server subscribes automatically.
    pub fn server_defaults(&self) -> impl Iterator<Item = Channel> + '_ {
        self.server_defaults.iter().copied()
    }

    /// Return the desired set to the server defaults.
    pub fn reset(&mut self) {
        self.desired = self
            .server_defaults
            .iter()
            .map(|c| (*c, BTreeSet::new()))
            .collect();
    }
}
