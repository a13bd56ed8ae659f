//! Credentials and the external credential-refresh capability.
//!
//! The client never mints tokens itself. It asks a [`CredentialProvider`]
//! whenever it needs a fresh [`Credential`]: before the first connect, after
//! an auth close (4001/4002), and when the server announces `token_expiring`.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;

/// A bearer token plus its expiry instant.
///
/// Immutable per issuance; a refresh replaces it wholesale.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential from a token and its expiry.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// The bearer token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the token stops being accepted.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still usable at `now`, treating anything within
    /// `margin` of expiry as already expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The auth capability the client consumes.
///
/// Implementations typically call a token-refresh endpoint. Errors should be
/// reported as [`LiveError::Credential`](crate::error::LiveError::Credential).
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Obtain a fresh credential.
    async fn refresh_credential(&self) -> Result<Credential>;
}

/// A provider that always hands back the same credential.
///
/// Useful for CLIs and tests where the token is supplied up front.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Wrap a fixed credential.
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn refresh_credential(&self) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}
