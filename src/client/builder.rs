//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```ignore
//! use ride_sync::Client;
//!
//! let client = Client::builder()
//!     .base_url("http://localhost:8000")
//!     .credential("eyJhbGciOi...")
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::protocol::{EventKind, InboundEvent};
use crate::router::{EventHandler, NullView, RideView, RouteContext};
use crate::session::{Credential, Session, SessionStore};
use crate::transport::ReconnectPolicy;

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default)]
pub struct ClientBuilder {
    /// Client options.
    options: ClientOptions,
    /// Persistence backend.
    store: Option<Arc<dyn SessionStore>>,
    /// Credential installed at build time.
    credential: Option<Credential>,
    /// Presentation callbacks.
    view: Option<Arc<dyn RideView>>,
    /// Handlers replacing default reactions.
    handlers: Vec<(EventKind, EventHandler)>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("options", &self.options)
            .field("persistent", &self.store.is_some())
            .field("has_credential", &self.credential.is_some())
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the service root.
    #[inline]
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.options.base_url = base_url.into();
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.options.reconnect = policy;
        self
    }

    /// Enables realtime pings.
    #[inline]
    #[must_use]
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.options.heartbeat_interval = Some(interval);
        self
    }

    /// Persists the session with `store`.
    #[inline]
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Installs a credential, replacing any persisted one.
    #[inline]
    #[must_use]
    pub fn credential(mut self, credential: impl Into<Credential>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Sets the presentation callbacks.
    #[inline]
    #[must_use]
    pub fn view(mut self, view: Arc<dyn RideView>) -> Self {
        self.view = Some(view);
        self
    }

    /// Registers the handler for `kind`, replacing its default reaction.
    #[must_use]
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&InboundEvent, &RouteContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.push((kind, Box::new(handler)));
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the options are invalid
    /// - The store's error if the persisted session cannot be read
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn build(self) -> Result<Client> {
        self.options.validate()?;

        let session = match self.store {
            Some(store) => Session::with_store(store)?,
            None => Session::new(),
        };
        if let Some(credential) = self.credential {
            session.set_credential(credential);
        }

        let view: Arc<dyn RideView> = match self.view {
            Some(view) => view,
            None => Arc::new(NullView),
        };

        Client::new(self.options, session, view, self.handlers)
    }
}

// ============================================================================
// Tests
// ============================================================================
