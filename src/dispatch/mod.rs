//! Command dispatch.
//!
//! The [`Dispatcher`] delivers each [`RideCommand`] exactly once through
//! the best available path:
//!
//! | Transport state | Path | Result |
//! |-----------------|------|--------|
//! | `Open` | Realtime frame `{"action": ...}` | [`Accepted::Queued`] |
//! | `Open`, send failed | Fallback request | [`Accepted::Completed`] |
//! | anything else | Fallback request | [`Accepted::Completed`] |
//!
//! Nothing is retried or queued. A failed fallback request is returned to
//! the caller as is.
//!
//! A dispatcher built with [`Dispatcher::detached`] holds the transport
//! weakly. Once the transport is gone every command takes the fallback.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `api` | Fallback request/response client |
//! | `refresher` | List reloading through the fallback surface |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::{Ride, RideCommand};
use crate::router::{RefreshTarget, Refresher};
use crate::session::Session;
use crate::transport::{Transport, WeakTransport};

// ============================================================================
// Submodules
// ============================================================================

/// Fallback request/response client.
pub mod api;

/// List reloading through the fallback surface.
pub mod refresher;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::RideApi;
pub use refresher::ApiRefresher;

// ============================================================================
// Fallback
// ============================================================================

/// Point-to-point path used when the realtime channel is unavailable.
#[async_trait]
pub trait Fallback: Send + Sync {
    /// Performs `command` and returns the affected ride.
    async fn execute(&self, command: &RideCommand) -> Result<Ride>;
}

// ============================================================================
// Accepted
// ============================================================================

/// How a command was accepted for delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum Accepted {
    /// Written to the realtime channel. The outcome arrives as a push.
    Queued,
    /// Performed by the fallback surface.
    Completed(Ride),
}

impl Accepted {
    /// Returns `true` if the realtime channel carried the command.
    #[inline]
    #[must_use]
    pub fn is_realtime(&self) -> bool {
        matches!(self, Self::Queued)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Realtime channel as seen by a dispatcher.
#[derive(Debug, Clone)]
enum Channel {
    Owned(Transport),
    Detached(WeakTransport),
}

/// Chooses a transport per command.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Channel,
    fallback: Arc<dyn Fallback>,
    refresher: Arc<dyn Refresher>,
    session: Session,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        transport: Transport,
        fallback: Arc<dyn Fallback>,
        refresher: Arc<dyn Refresher>,
        session: Session,
    ) -> Self {
        Self {
            channel: Channel::Owned(transport),
            fallback,
            refresher,
            session,
        }
    }

    /// Creates a dispatcher that does not keep `transport` alive.
    ///
    /// Used by components the transport itself owns, such as its inbound
    /// handler.
    #[must_use]
    pub fn detached(
        transport: WeakTransport,
        fallback: Arc<dyn Fallback>,
        refresher: Arc<dyn Refresher>,
        session: Session,
    ) -> Self {
        Self {
            channel: Channel::Detached(transport),
            fallback,
            refresher,
            session,
        }
    }

    /// Returns the transport if it is still alive.
    fn transport(&self) -> Option<Transport> {
        match &self.channel {
            Channel::Owned(transport) => Some(transport.clone()),
            Channel::Detached(weak) => weak.upgrade(),
        }
    }

    /// Delivers `command`.
    ///
    /// # Errors
    ///
    /// Returns the fallback's error if the realtime channel was not usable
    /// and the fallback request failed.
    pub async fn dispatch(&self, command: RideCommand) -> Result<Accepted> {
        let action = command.action();

        if let Some(transport) = self.transport().filter(Transport::is_open) {
            match transport.send_text(command.to_frame()?).await {
                Ok(()) => {
                    debug!(action, "Command sent over realtime channel");
                    return Ok(Accepted::Queued);
                }
                Err(e) => warn!(action, error = %e, "Realtime send failed, using fallback"),
            }
        }

        let ride = self.fallback.execute(&command).await?;
        info!(action, ride_id = %ride.id, "Command completed over fallback");

        let role = self.session.role();
        for &target in follow_up(&command) {
            if target.applies_to(role) {
                self.refresher.refresh(target, Duration::ZERO);
            }
        }

        Ok(Accepted::Completed(ride))
    }
}

/// Lists to reload after a fallback command succeeds.
fn follow_up(command: &RideCommand) -> &'static [RefreshTarget] {
    match command {
        RideCommand::RideRequested { .. } => &[RefreshTarget::MyRides],
        RideCommand::RideAssigned { .. } => {
            &[RefreshTarget::RideRequests, RefreshTarget::AssignedRides]
        }
        RideCommand::RideCompleted { .. } => &[RefreshTarget::AssignedRides],
    }
}

// ============================================================================
// Tests
// ============================================================================
