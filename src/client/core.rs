//! Ride-sync client coordinator.
//!
//! The [`Client`] wires the session, transport, router and dispatcher
//! together and exposes the user-facing actions.
//!
//! # Example
//!
//! ```ignore
//! use ride_sync::Client;
//!
//! # async fn example() -> ride_sync::Result<()> {
//! let client = Client::builder()
//!     .base_url("http://localhost:8000")
//!     .credential("eyJhbGciOi...")
//!     .build()?;
//!
//! client.connect()?;
//! client.request_ride("Airport", "Downtown").await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::dispatch::{Accepted, ApiRefresher, Dispatcher, RideApi};
use crate::error::{Error, Result};
use crate::identifiers::RideId;
use crate::protocol::{EventKind, Ride, RideCommand};
use crate::router::{
    ConnectionStatus, EventHandler, EventRouter, Notice, RefreshTarget, RideView,
};
use crate::session::{Credential, Identity, Role, Session};
use crate::transport::{ConnectionState, LifecycleEvent, Transport, is_terminal_close};

use super::builder::ClientBuilder;
use super::options::ClientOptions;

// ============================================================================
// Constants
// ============================================================================

/// Shown when the channel opens.
const CONNECTED_NOTICE: &str = "Real-time updates enabled";

/// Shown when a reconnect is scheduled.
const RECONNECTING_NOTICE: &str = "Connection lost. Attempting to reconnect...";

/// Shown when the server ends the connection for good.
const CLOSED_NOTICE: &str = "Real-time connection closed by the server";

/// Shown when reconnect attempts are used up.
const EXHAUSTED_NOTICE: &str = "Real-time connection failed. Reconnect to try again.";

// ============================================================================
// ActionTexts
// ============================================================================

/// Notices for one user action.
struct ActionTexts {
    /// Sent over the realtime channel.
    queued: &'static str,
    /// Performed by the fallback surface.
    completed: &'static str,
    /// Rejected without server detail.
    failed: &'static str,
}

const REQUEST_TEXTS: ActionTexts = ActionTexts {
    queued: "Ride request sent! Waiting for confirmation...",
    completed: "Ride requested successfully!",
    failed: "Failed to request ride",
};

const ASSIGN_TEXTS: ActionTexts = ActionTexts {
    queued: "Accepting ride...",
    completed: "Ride assigned successfully!",
    failed: "Failed to assign ride",
};

const COMPLETE_TEXTS: ActionTexts = ActionTexts {
    queued: "Completing ride...",
    completed: "Ride completed successfully!",
    failed: "Failed to complete ride",
};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
struct ClientInner {
    /// Client options.
    options: ClientOptions,
    /// Credential and identity.
    session: Session,
    /// Realtime transport.
    transport: Transport,
    /// Fallback surface.
    api: RideApi,
    /// Transport selection.
    dispatcher: Dispatcher,
    /// Presentation callbacks.
    view: Arc<dyn RideView>,
    /// Pending automatic connect.
    startup: Mutex<Option<JoinHandle<()>>>,
}

// ============================================================================
// Client
// ============================================================================

/// Realtime ride-dispatch client.
///
/// Cheap to clone; all clones share one connection and session.
#[derive(Clone)]
pub struct Client {
    /// Shared inner state.
    inner: Arc<ClientInner>,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.options.base_url)
            .field("state", &self.state())
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Wires the components together.
    pub(crate) fn new(
        options: ClientOptions,
        session: Session,
        view: Arc<dyn RideView>,
        handlers: Vec<(EventKind, EventHandler)>,
    ) -> Result<Self> {
        let api = RideApi::new(options.rest_url()?, session.clone(), options.request_timeout)?;
        let refresher = Arc::new(ApiRefresher::new(api.clone(), Arc::clone(&view)));

        let transport = Transport::new(
            options.ws_url()?,
            session.clone(),
            options.transport_config(),
        );

        let dispatcher = Dispatcher::new(
            transport.clone(),
            Arc::new(api.clone()),
            refresher.clone(),
            session.clone(),
        );

        // The router lives inside the transport's inbound handler
        let handler_dispatcher = Dispatcher::detached(
            transport.downgrade(),
            Arc::new(api.clone()),
            refresher.clone(),
            session.clone(),
        );

        let mut router = EventRouter::builder(session.clone(), Arc::clone(&view), refresher)
            .refresh_delay(options.refresh_delay)
            .dispatcher(handler_dispatcher);
        for (kind, handler) in handlers {
            router = router.handler(kind, handler);
        }
        let router = router.build();

        transport.set_inbound_handler(move |raw| {
            router.route(raw);
        });

        let lifecycle_view = Arc::clone(&view);
        transport.subscribe(move |event| present_lifecycle(lifecycle_view.as_ref(), event));

        debug!(base_url = %options.base_url, "Client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                options,
                session,
                transport,
                api,
                dispatcher,
                view,
                startup: Mutex::new(None),
            }),
        })
    }
}

// ============================================================================
// Client - Connection
// ============================================================================

impl Client {
    /// Connects after the startup delay if a credential is present.
    ///
    /// Returns `true` if the automatic connect was scheduled.
    pub fn start(&self) -> bool {
        if !self.inner.session.has_credential() {
            debug!("No credential, staying idle");
            return false;
        }

        let transport = self.inner.transport.clone();
        let delay = self.inner.options.startup_delay;
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            transport.ensure_connected();
        });

        if let Some(previous) = self.inner.startup.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    /// Installs a credential from the authentication flow.
    pub fn set_credential(&self, credential: impl Into<Credential>) {
        self.inner.session.set_credential(credential.into());
    }

    /// Connects now, restoring the full reconnect budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if no credential is installed;
    /// the user is told to log in.
    pub fn connect(&self) -> Result<()> {
        self.cancel_startup();

        if let Err(e) = self.inner.transport.connect() {
            self.inner.view.status(ConnectionStatus::Disconnected);
            self.inner.view.notify(Notice::error(e.user_message()));
            return Err(e);
        }
        Ok(())
    }

    /// Disconnects without reconnecting.
    pub fn disconnect(&self) {
        self.cancel_startup();
        self.inner.transport.disconnect();
    }

    /// Disconnects and forgets the credential, here and in the store.
    pub fn logout(&self) {
        self.disconnect();
        self.inner.session.clear();
        info!("Logged out");
    }

    /// Reconnects when the page becomes visible.
    ///
    /// Returns `true` if an attempt was started.
    pub fn on_visibility_change(&self, visible: bool) -> bool {
        visible && self.inner.transport.ensure_connected()
    }

    /// Reconnects when the window gains focus.
    ///
    /// Returns `true` if an attempt was started.
    pub fn on_focus(&self) -> bool {
        self.inner.transport.ensure_connected()
    }

    /// Tears the client down.
    pub fn shutdown(&self) {
        self.disconnect();
        debug!("Client shut down");
    }

    fn cancel_startup(&self) {
        if let Some(handle) = self.inner.startup.lock().take() {
            handle.abort();
        }
    }
}

// ============================================================================
// Client - Actions
// ============================================================================

impl Client {
    /// Requests a ride.
    ///
    /// # Errors
    ///
    /// Returns the fallback error if the realtime channel was unavailable and
    /// the request failed. An error notice has already been shown.
    pub async fn request_ride(
        &self,
        pickup: impl Into<String>,
        dropoff: impl Into<String>,
    ) -> Result<Accepted> {
        self.perform(RideCommand::request(pickup, dropoff), &REQUEST_TEXTS)
            .await
    }

    /// Accepts an open ride request.
    ///
    /// # Errors
    ///
    /// See [`request_ride`](Self::request_ride).
    pub async fn assign_ride(&self, ride_id: impl Into<RideId>) -> Result<Accepted> {
        self.perform(RideCommand::assign(ride_id), &ASSIGN_TEXTS)
            .await
    }

    /// Completes an assigned ride.
    ///
    /// # Errors
    ///
    /// See [`request_ride`](Self::request_ride).
    pub async fn complete_ride(&self, ride_id: impl Into<RideId>) -> Result<Accepted> {
        self.perform(RideCommand::complete(ride_id), &COMPLETE_TEXTS)
            .await
    }

    /// Delivers a command without notices.
    ///
    /// # Errors
    ///
    /// Returns the fallback error if the realtime channel was unavailable and
    /// the request failed.
    pub async fn dispatch(&self, command: RideCommand) -> Result<Accepted> {
        self.inner.dispatcher.dispatch(command).await
    }

    /// Loads a ride list and shows it.
    ///
    /// # Errors
    ///
    /// Returns the fallback error; the view is left unchanged.
    pub async fn refresh(&self, target: RefreshTarget) -> Result<Vec<Ride>> {
        let rides = self.inner.api.list(target).await?;
        self.inner.view.show_rides(target, &rides);
        Ok(rides)
    }

    /// Returns the caller's role.
    ///
    /// Uses the handshake identity when known, otherwise checks the
    /// driver-only list.
    ///
    /// # Errors
    ///
    /// Returns the status check's error.
    pub async fn resolve_role(&self) -> Result<Option<Role>> {
        if let Some(role) = self.inner.session.role() {
            return Ok(Some(role));
        }
        self.inner.api.detect_role().await
    }

    async fn perform(&self, command: RideCommand, texts: &ActionTexts) -> Result<Accepted> {
        let result = self.dispatch(command).await;

        let notice = match &result {
            Ok(Accepted::Queued) => Notice::success(texts.queued),
            Ok(Accepted::Completed(_)) => Notice::success(texts.completed),
            Err(Error::Api { detail: None, .. }) => Notice::error(texts.failed),
            Err(e) => Notice::error(e.user_message()),
        };
        self.inner.view.notify(notice);

        result
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl Client {
    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.transport.state()
    }

    /// Returns the identity confirmed by the current connection.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.inner.session.identity()
    }

    /// Returns the session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Returns the transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    /// Returns the fallback client.
    #[inline]
    #[must_use]
    pub fn api(&self) -> &RideApi {
        &self.inner.api
    }

    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(handle) = self.startup.get_mut().take() {
            handle.abort();
        }
    }
}

/// Maps lifecycle notifications to the view.
fn present_lifecycle(view: &dyn RideView, event: &LifecycleEvent) {
    match event {
        LifecycleEvent::StateChanged(state) => view.status(ConnectionStatus::from(*state)),
        LifecycleEvent::Connected => view.notify(Notice::success(CONNECTED_NOTICE)),
        LifecycleEvent::Error { .. } => view.status(ConnectionStatus::Disconnected),
        LifecycleEvent::Disconnected {
            intentional: false,
            code: Some(code),
        } if is_terminal_close(*code) => view.notify(Notice::error(CLOSED_NOTICE)),
        LifecycleEvent::Disconnected { .. } => {}
        LifecycleEvent::ReconnectScheduled { .. } => {
            view.notify(Notice::error(RECONNECTING_NOTICE));
        }
        LifecycleEvent::Exhausted => view.notify(Notice::error(EXHAUSTED_NOTICE)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::transport::CLOSE_NORMAL;

    #[derive(Default)]
    struct Recorder {
        notices: Mutex<Vec<Notice>>,
        statuses: Mutex<Vec<ConnectionStatus>>,
    }

    impl RideView for Recorder {
        fn status(&self, status: ConnectionStatus) {
            self.statuses.lock().push(status);
        }

        fn notify(&self, notice: Notice) {
            self.notices.lock().push(notice);
        }
    }

    #[test]
    fn test_intentional_disconnect_is_not_an_error() {
        let view = Recorder::default();
        present_lifecycle(
            &view,
            &LifecycleEvent::Disconnected {
                intentional: true,
                code: Some(CLOSE_NORMAL),
            },
        );
        assert!(view.notices.lock().is_empty());
    }

    #[test]
    fn test_lifecycle_notices() {
        let view = Recorder::default();
        present_lifecycle(&view, &LifecycleEvent::Connected);
        present_lifecycle(
            &view,
            &LifecycleEvent::ReconnectScheduled {
                attempt: 1,
                delay: Duration::from_secs(3),
            },
        );
        present_lifecycle(&view, &LifecycleEvent::Exhausted);
        present_lifecycle(
            &view,
            &LifecycleEvent::Disconnected {
                intentional: false,
                code: Some(1008),
            },
        );

        assert_eq!(
            *view.notices.lock(),
            vec![
                Notice::success(CONNECTED_NOTICE),
                Notice::error(RECONNECTING_NOTICE),
                Notice::error(EXHAUSTED_NOTICE),
                Notice::error(CLOSED_NOTICE),
            ]
        );
    }

    #[test]
    fn test_transport_error_marks_disconnected() {
        let view = Recorder::default();
        present_lifecycle(
            &view,
            &LifecycleEvent::Error {
                message: "reset".into(),
            },
        );
        assert_eq!(*view.statuses.lock(), vec![ConnectionStatus::Disconnected]);
        assert!(view.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn test_connect_without_credential_tells_user() {
        let view = Arc::new(Recorder::default());
        let client = Client::builder().view(view.clone()).build().expect("client");

        assert!(matches!(client.connect(), Err(Error::MissingCredential)));
        assert!(!client.start());
        assert!(!client.on_focus());
        assert_eq!(
            *view.notices.lock(),
            vec![Notice::error("Please login first")]
        );
    }

    #[tokio::test]
    async fn test_hidden_page_does_not_connect() {
        let client = Client::builder().credential("token").build().expect("client");
        assert!(!client.on_visibility_change(false));
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let client = Client::builder().credential("token").build().expect("client");
        assert!(client.start());

        client.logout();

        assert!(!client.session().has_credential());
        assert_eq!(client.state(), ConnectionState::Idle);
    }
}
