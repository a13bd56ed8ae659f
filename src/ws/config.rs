//! Configuration and builder for [`LiveClient`].

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::auth::{Credential, CredentialProvider};
use crate::constants::{WS_BASE_URL, WS_PATH, defaults};
use crate::error::Result;
use crate::types::enums::{Channel, DeviceType};
use crate::ws::client::LiveClient;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the [`LiveClient`].
///
/// Heartbeat tolerance and backoff values are not fixed by the server
/// contract, so all of them are tunable here.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Base URL; the socket is opened at `<base_url>/ws`.
    pub base_url: String,
    /// Platform reported as `device_type`.
    pub device_type: DeviceType,
    /// Application version reported as `app_version`.
    pub app_version: String,
    /// Heartbeat interval assumed until the server advertises one.
    pub heartbeat_interval: Duration,
    /// Margin added to the heartbeat interval before the socket is declared dead.
    pub heartbeat_grace: Duration,
    /// Bound on the WebSocket handshake.
    pub connect_timeout: Duration,
    /// First reconnect delay for transient failures.
    pub reconnect_delay_initial: Duration,
    /// Cap on the un-jittered reconnect delay.
    pub reconnect_delay_max: Duration,
    /// First reconnect delay after a rate-limit close (4005).
    pub rate_limited_delay_initial: Duration,
    /// Relative jitter applied to reconnect delays, in `[0, 1)`.
    pub reconnect_jitter: f64,
    /// Credentials this close to expiry are refreshed before connecting.
    pub credential_expiry_margin: Duration,
    /// Broadcast capacity of each consumer stream.
    pub channel_capacity: usize,
    /// Channels the server subscribes every connection to automatically.
    pub server_default_channels: Vec<Channel>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: WS_BASE_URL.to_owned(),
            device_type: DeviceType::default(),
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            heartbeat_interval: Duration::from_secs(defaults::HEARTBEAT_INTERVAL_SECS),
            heartbeat_grace: Duration::from_secs(defaults::HEARTBEAT_GRACE_SECS),
            connect_timeout: Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS),
            reconnect_delay_initial: Duration::from_millis(defaults::RECONNECT_DELAY_INITIAL_MS),
            reconnect_delay_max: Duration::from_millis(defaults::RECONNECT_DELAY_MAX_MS),
            rate_limited_delay_initial: Duration::from_millis(
                defaults::RATE_LIMITED_DELAY_INITIAL_MS,
            ),
            reconnect_jitter: defaults::RECONNECT_JITTER,
            credential_expiry_margin: Duration::from_secs(
                defaults::CREDENTIAL_EXPIRY_MARGIN_SECS as u64,
            ),
            channel_capacity: defaults::CHANNEL_CAPACITY,
            server_default_channels: Channel::SERVER_DEFAULTS.to_vec(),
        }
    }
}

impl LiveConfig {
    /// Build the socket URL for the given credential:
    /// `<base>/ws?token=…&device_type=…&app_version=…`.
    pub fn endpoint_url(&self, credential: &Credential) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{WS_PATH}",
            self.base_url.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("token", credential.token())
            .append_pair("device_type", self.device_type.as_str())
            .append_pair("app_version", &self.app_version);
        Ok(url)
    }

    /// Heartbeat liveness window: interval plus grace.
    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_interval + self.heartbeat_grace
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`LiveClient`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use chrono::{Duration, Utc};
/// use live_ws::auth::{Credential, StaticCredentialProvider};
/// use live_ws::types::DeviceType;
/// use live_ws::ws::config::LiveClientBuilder;
///
/// # #[tokio::main]
/// # async fn main() {
/// let credential = Credential::new("token", Utc::now() + Duration::hours(1));
/// let client = LiveClientBuilder::new(StaticCredentialProvider::new(credential))
///     .base_url("wss://api.example.com/api/v1")
///     .device_type(DeviceType::Ios)
///     .app_version("2.4.0")
///     .build();
/// # }
/// ```
pub struct LiveClientBuilder {
    provider: Arc<dyn CredentialProvider>,
    credential: Option<Credential>,
    config: LiveConfig,
}

impl LiveClientBuilder {
    /// Create a new builder around the auth capability.
    pub fn new(provider: impl CredentialProvider) -> Self {
        Self::with_provider(Arc::new(provider))
    }

    /// Create a new builder around a shared auth capability.
    pub fn with_provider(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            credential: None,
            config: LiveConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: LiveConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the client with an already-issued credential so the first connect
    /// does not call the provider.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the base URL. Default: [`WS_BASE_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the reported device type. Default: `web`.
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.config.device_type = device_type;
        self
    }

    /// Set the reported app version. Default: this crate's version.
    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.config.app_version = version.into();
        self
    }

    /// Set the heartbeat interval assumed before the welcome frame. Default: 30s.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat grace margin. Default: 10s.
    pub fn heartbeat_grace(mut self, grace: Duration) -> Self {
        self.config.heartbeat_grace = grace;
        self
    }

    /// Set the handshake timeout. Default: 10s.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the initial and maximum reconnect delays. Default: 1s and 30s.
    pub fn reconnect_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.config.reconnect_delay_initial = initial;
        self.config.reconnect_delay_max = max.max(initial);
        self
    }

    /// Set the initial delay after a rate-limit close. Default: 10s.
    pub fn rate_limited_delay(mut self, initial: Duration) -> Self {
        self.config.rate_limited_delay_initial = initial;
        self
    }

    /// Set the reconnect jitter ratio, clamped to `[0, 0.9]`. Default: 0.2.
    pub fn reconnect_jitter(mut self, ratio: f64) -> Self {
        self.config.reconnect_jitter = ratio.clamp(0.0, 0.9);
        self
    }

    /// Set the broadcast capacity of each consumer stream. Default: 1,024.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    /// Build the client and spawn its background task.
    ///
    /// Must be called from within a Tokio runtime. The client stays
    /// disconnected until [`LiveClient::connect`] is called.
    pub fn build(self) -> LiveClient {
        LiveClient::spawn(self.config, self.provider, self.credential)
    }
}
