//! Token lifecycle coordination.
//!
//! Tracks the credential used for reconnects and the state of any in-flight
//! refresh. The provider call itself runs on a spawned task owned by the
//! client; this type only decides whether a refresh should start and records
//! its outcome.

use chrono::{DateTime, Duration, Utc};

use crate::auth::Credential;

/// Owner of the client's current [`Credential`].
#[derive(Debug, Clone)]
pub struct TokenCoordinator {
    credential: Option<Credential>,
    expiry_margin: Duration,
    refresh_in_flight: bool,
    awaiting_confirmation: bool,
    confirmed_expiry: Option<DateTime<Utc>>,
}

impl TokenCoordinator {
    /// Create a coordinator, optionally seeded with an issued credential.
    pub fn new(credential: Option<Credential>, expiry_margin: Duration) -> Self {
        Self {
            credential,
            expiry_margin,
            refresh_in_flight: false,
            awaiting_confirmation: false,
            confirmed_expiry: None,
        }
    }

    /// The stored credential if it is still usable at `now`.
    ///
    /// `None` means a fresh credential must be obtained before connecting.
    pub fn valid_credential(&self, now: DateTime<Utc>) -> Option<Credential> {
        self.credential
            .as_ref()
            .filter(|c| c.is_valid_at(now, self.expiry_margin))
            .cloned()
    }

    /// The stored credential regardless of validity.
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Forget the stored credential after the server rejected it (4001/4002).
    pub fn invalidate(&mut self) {
        if self.credential.take().is_some() {
            tracing::info!("Credential invalidated; a fresh one will be requested");
        }
    }

    /// Replace the stored credential with a new issuance.
    pub fn install(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    /// Mark a provider call as started. Returns `false` if one is already
    /// running, in which case the caller must not start another.
    pub fn begin_refresh(&mut self) -> bool {
        if self.refresh_in_flight {
            return false;
        }
        self.refresh_in_flight = true;
        true
    }

    /// Mark the provider call as finished.
    pub fn end_refresh(&mut self) {
        self.refresh_in_flight = false;
    }

    /// Whether a provider call is running.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_in_flight
    }

    /// Record that a `refresh_token` frame was sent and is awaiting the
    /// server's `token_refreshed`.
    pub fn mark_sent(&mut self) {
        self.awaiting_confirmation = true;
    }

    /// Whether a sent refresh is still unconfirmed.
    pub fn is_awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    /// Handle `token_refreshed`. `expires_at` is the server-reported expiry,
    /// if it sent one; otherwise the stored credential's expiry is used.
    pub fn confirm(&mut self, expires_at: Option<DateTime<Utc>>) {
        self.awaiting_confirmation = false;
        self.confirmed_expiry =
            expires_at.or_else(|| self.credential.as_ref().map(Credential::expires_at));
    }

    /// Handle an error frame while a refresh is unconfirmed. Returns `true`
    /// if the error is attributed to the refresh.
    pub fn reject_pending(&mut self) -> bool {
        std::mem::replace(&mut self.awaiting_confirmation, false)
    }

    /// Last expiry the server confirmed.
    pub fn confirmed_expiry(&self) -> Option<DateTime<Utc>> {
        self.confirmed_expiry
    }

    /// Drop refresh bookkeeping on stop. The stored credential is kept.
    pub fn reset(&mut self) {
        self.refresh_in_flight = false;
        self.awaiting_confirmation = false;
    }
}
