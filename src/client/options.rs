//! Client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ride_sync::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_base_url("https://rides.example.com")
//!     .with_heartbeat(Duration::from_secs(25));
//!
//! assert_eq!(options.ws_url()?.as_str(), "wss://rides.example.com/ws");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{ReconnectPolicy, TransportConfig};

// ============================================================================
// Constants
// ============================================================================

/// Default service root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Path of the realtime endpoint below the service root.
const WS_PATH: &str = "ws";

// ============================================================================
// ClientOptions
// ============================================================================

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Service root for both the realtime and the fallback surface.
    pub base_url: String,

    /// Reconnection backoff.
    pub reconnect: ReconnectPolicy,

    /// Realtime handshake timeout.
    pub connect_timeout: Duration,

    /// Fallback request timeout.
    pub request_timeout: Duration,

    /// Delay before refreshes triggered by pushes.
    pub refresh_delay: Duration,

    /// Delay before the automatic connect in `start`.
    pub startup_delay: Duration,

    /// Realtime ping period, `None` for no pings.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            refresh_delay: Duration::from_millis(500),
            startup_delay: Duration::from_millis(500),
            heartbeat_interval: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the service root.
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the realtime handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the fallback request timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the delay before push-triggered refreshes.
    #[inline]
    #[must_use]
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Sets the delay before the automatic connect.
    #[inline]
    #[must_use]
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Enables realtime pings every `interval`.
    #[inline]
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }
}

// ============================================================================
// Derived Settings
// ============================================================================

impl ClientOptions {
    /// Returns the fallback surface root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is not an `http(s)` URL.
    pub fn rest_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("Invalid base URL '{}': {e}", self.base_url)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::config(format!(
                "Base URL must use http or https, got '{other}'"
            ))),
        }
    }

    /// Returns the realtime endpoint without credential.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`; the path gets `/ws`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is not an `http(s)` URL.
    pub fn ws_url(&self) -> Result<Url> {
        let mut url = self.rest_url()?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };

        url.set_scheme(scheme)
            .map_err(|()| Error::config(format!("Cannot derive {scheme} URL")))?;

        let path = format!("{}/{WS_PATH}", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(None);
        Ok(url)
    }

    /// Returns the transport settings.
    #[inline]
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            policy: self.reconnect,
            connect_timeout: self.connect_timeout,
            heartbeat: self.heartbeat_interval,
        }
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.rest_url()?;

        let policy = &self.reconnect;
        if policy.base_delay.is_zero() {
            return Err(Error::config("Reconnect base delay must be positive"));
        }
        if policy.max_delay < policy.base_delay {
            return Err(Error::config(format!(
                "Reconnect max delay ({:?}) is below base delay ({:?})",
                policy.max_delay, policy.base_delay
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be positive"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be positive"));
        }
        if self.heartbeat_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(Error::config("Heartbeat interval must be positive"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
