//! Event routing.
//!
//! The [`EventRouter`] decodes each inbound frame and invokes the handler
//! registered for its kind, exactly once, in arrival order.
//!
//! # Routing Rules
//!
//! | Input | Effect |
//! |-------|--------|
//! | Malformed frame | Logged and dropped |
//! | `connected` | Identity, status, initial refresh, then the `Connected` handler |
//! | Recognized kind | Its single registered handler |
//! | Unknown kind | Ignored |
//!
//! Handlers are fixed when the router is built. A handler that fails or
//! panics is logged; the next frame is routed normally.
//!
//! A router built with a [`Dispatcher`] lets handlers send commands through
//! [`RouteContext::spawn_dispatch`].
//!
//! # Example
//!
//! ```ignore
//! use ride_sync::router::{EventRouter, NoRefresh, NullView};
//! use ride_sync::protocol::EventKind;
//!
//! let router = EventRouter::builder(session, Arc::new(NullView), Arc::new(NoRefresh))
//!     .on(EventKind::NewRide, |event, ctx| {
//!         println!("{event:?}");
//!         Ok(())
//!     })
//!     .build();
//!
//! router.route(r#"{"event":"new_ride","ride_id":1,"pickup":"A","dropoff":"B"}"#);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `view` | Presentation and refresh seams |
//! | `reactions` | Default handlers |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::identifiers::UserId;
use crate::protocol::{EventKind, InboundEvent, RideCommand};
use crate::session::{Identity, Role, Session};

// ============================================================================
// Submodules
// ============================================================================

/// Presentation and refresh seams.
pub mod view;

/// Default handlers.
mod reactions;

// ============================================================================
// Re-exports
// ============================================================================

pub use view::{
    ConnectionStatus, NoRefresh, Notice, NullView, RefreshTarget, Refresher, RideView,
};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before push-triggered refreshes.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Types
// ============================================================================

/// Event handler callback.
pub type EventHandler = Box<dyn Fn(&InboundEvent, &RouteContext<'_>) -> Result<()> + Send + Sync>;

// ============================================================================
// RouteContext
// ============================================================================

/// Collaborators available to a handler.
pub struct RouteContext<'a> {
    session: &'a Session,
    view: &'a dyn RideView,
    refresher: &'a dyn Refresher,
    dispatcher: Option<&'a Dispatcher>,
    refresh_delay: Duration,
}

impl RouteContext<'_> {
    /// Returns the session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        self.session
    }

    /// Returns the view.
    #[inline]
    #[must_use]
    pub fn view(&self) -> &dyn RideView {
        self.view
    }

    /// Shows a notice.
    pub fn notify(&self, notice: Notice) {
        self.view.notify(notice);
    }

    /// Reloads `target` immediately if it concerns the current role.
    pub fn refresh_now(&self, target: RefreshTarget) {
        self.refresh_after(target, Duration::ZERO);
    }

    /// Reloads `target` after the refresh delay if it concerns the current role.
    pub fn refresh_later(&self, target: RefreshTarget) {
        self.refresh_after(target, self.refresh_delay);
    }

    /// Sends `command` in the background without waiting for the outcome.
    ///
    /// Returns `false` if the router has no dispatcher or no tokio runtime
    /// is running. The outcome is only logged.
    pub fn spawn_dispatch(&self, command: RideCommand) -> bool {
        let Some(dispatcher) = self.dispatcher else {
            warn!(action = command.action(), "No dispatcher, command dropped");
            return false;
        };

        let Ok(handle) = Handle::try_current() else {
            warn!(action = command.action(), "No runtime, command dropped");
            return false;
        };

        let dispatcher = dispatcher.clone();
        handle.spawn(async move {
            let action = command.action();
            match dispatcher.dispatch(command).await {
                Ok(accepted) => debug!(action, realtime = accepted.is_realtime(), "Command accepted"),
                Err(e) => warn!(action, error = %e, "Command from handler failed"),
            }
        });
        true
    }

    fn refresh_after(&self, target: RefreshTarget, delay: Duration) {
        let role = self.session.role();
        if target.applies_to(role) {
            self.refresher.refresh(target, delay);
        } else {
            trace!(%target, ?role, "Refresh skipped for role");
        }
    }
}

// ============================================================================
// EventRouter
// ============================================================================

/// Routes inbound frames to handlers.
pub struct EventRouter {
    session: Session,
    view: Arc<dyn RideView>,
    refresher: Arc<dyn Refresher>,
    dispatcher: Option<Dispatcher>,
    refresh_delay: Duration,
    handlers: FxHashMap<EventKind, EventHandler>,
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().map(ToString::to_string).collect();
        kinds.sort_unstable();
        f.debug_struct("EventRouter")
            .field("refresh_delay", &self.refresh_delay)
            .field("dispatches", &self.dispatcher.is_some())
            .field("handlers", &kinds)
            .finish_non_exhaustive()
    }
}

impl EventRouter {
    /// Starts building a router.
    #[must_use]
    pub fn builder(
        session: Session,
        view: Arc<dyn RideView>,
        refresher: Arc<dyn Refresher>,
    ) -> EventRouterBuilder {
        EventRouterBuilder {
            session,
            view,
            refresher,
            dispatcher: None,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            defaults: true,
            handlers: FxHashMap::default(),
        }
    }

    /// Returns `true` if a handler is registered for `kind`.
    #[inline]
    #[must_use]
    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Routes one raw frame.
    ///
    /// Returns the kind that was routed, `None` if the frame was dropped or
    /// its kind is unknown. Never fails.
    pub fn route(&self, raw: &str) -> Option<EventKind> {
        let event = match InboundEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return None;
            }
        };

        self.route_event(&event)
    }

    /// Routes an already decoded event.
    pub fn route_event(&self, event: &InboundEvent) -> Option<EventKind> {
        let Some(kind) = event.kind() else {
            if let InboundEvent::Unknown { name, .. } = event {
                debug!(%name, "Ignoring unknown event");
            }
            return None;
        };

        trace!(%kind, "Routing event");

        if let InboundEvent::Connected {
            user_id, is_driver, ..
        } = event
        {
            self.on_handshake(user_id.zip(*is_driver));
        }

        if let Some(handler) = self.handlers.get(&kind) {
            let ctx = self.context();
            match catch_unwind(AssertUnwindSafe(|| handler(event, &ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%kind, error = %e, "Event handler failed"),
                Err(_) => error!(%kind, "Event handler panicked"),
            }
        }

        Some(kind)
    }

    /// Applies a handshake acknowledgement.
    fn on_handshake(&self, identity: Option<(UserId, bool)>) {
        match identity {
            Some((user_id, is_driver)) => {
                self.session
                    .confirm_identity(Identity::new(user_id, Role::from_is_driver(is_driver)));
            }
            None => warn!("Handshake acknowledgement without identity"),
        }

        self.view.status(ConnectionStatus::Connected);

        let ctx = self.context();
        for &target in RefreshTarget::initial_for(self.session.role()) {
            ctx.refresh_now(target);
        }
    }

    fn context(&self) -> RouteContext<'_> {
        RouteContext {
            session: &self.session,
            view: self.view.as_ref(),
            refresher: self.refresher.as_ref(),
            dispatcher: self.dispatcher.as_ref(),
            refresh_delay: self.refresh_delay,
        }
    }
}

// ============================================================================
// EventRouterBuilder
// ============================================================================

/// Builder for [`EventRouter`].
pub struct EventRouterBuilder {
    session: Session,
    view: Arc<dyn RideView>,
    refresher: Arc<dyn Refresher>,
    dispatcher: Option<Dispatcher>,
    refresh_delay: Duration,
    defaults: bool,
    handlers: FxHashMap<EventKind, EventHandler>,
}

impl EventRouterBuilder {
    /// Sets the delay before push-triggered refreshes.
    #[must_use]
    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Lets handlers send commands through `dispatcher`.
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Registers the handler for `kind`, replacing the default one.
    #[must_use]
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&InboundEvent, &RouteContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    /// Registers an already boxed handler for `kind`.
    #[must_use]
    pub fn handler(mut self, kind: EventKind, handler: EventHandler) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Leaves kinds without an explicit handler unhandled.
    #[must_use]
    pub fn without_default_reactions(mut self) -> Self {
        self.defaults = false;
        self
    }

    /// Builds the router.
    #[must_use]
    pub fn build(self) -> EventRouter {
        let mut handlers = self.handlers;

        if self.defaults {
            for kind in EventKind::ALL {
                if !handlers.contains_key(&kind)
                    && let Some(handler) = reactions::default_for(kind)
                {
                    handlers.insert(kind, handler);
                }
            }
        }

        EventRouter {
            session: self.session,
            view: self.view,
            refresher: self.refresher,
            dispatcher: self.dispatcher,
            refresh_delay: self.refresh_delay,
            handlers,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
