//! Observer seams between the router and the presentation layer.
//!
//! The router never renders anything. It reports through a [`RideView`]
//! and requests data through a [`Refresher`]; both are registered once at
//! construction.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::protocol::Ride;
use crate::session::Role;
use crate::transport::ConnectionState;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Connection indicator shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Realtime updates active.
    Connected,
    /// Attempt in progress.
    Connecting,
    /// No realtime updates.
    Disconnected,
}

impl From<ConnectionState> for ConnectionStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Open => Self::Connected,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Idle | ConnectionState::Closing | ConnectionState::Closed => {
                Self::Disconnected
            }
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected"),
            Self::Connecting => f.write_str("Connecting..."),
            Self::Disconnected => f.write_str("Disconnected"),
        }
    }
}

// ============================================================================
// Notice
// ============================================================================

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Positive feedback.
    Success(String),
    /// Problem report.
    Error(String),
}

impl Notice {
    /// Creates a success notice.
    #[inline]
    #[must_use]
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success(text.into())
    }

    /// Creates an error notice.
    #[inline]
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self::Error(text.into())
    }

    /// Returns the notice text.
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Error(text) => text,
        }
    }

    /// Returns `true` for [`Notice::Error`].
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// ============================================================================
// RefreshTarget
// ============================================================================

/// A ride list the view can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    /// Rides requested by the current rider.
    MyRides,
    /// Open requests awaiting a driver.
    RideRequests,
    /// Rides assigned to the current driver.
    AssignedRides,
}

impl RefreshTarget {
    /// The role whose dashboard shows this list.
    #[must_use]
    pub const fn audience(self) -> Role {
        match self {
            Self::MyRides => Role::Rider,
            Self::RideRequests | Self::AssignedRides => Role::Driver,
        }
    }

    /// Returns `true` if the list is relevant to `role`.
    ///
    /// With no known role every list is relevant.
    #[must_use]
    pub fn applies_to(self, role: Option<Role>) -> bool {
        role.is_none_or(|role| role == self.audience())
    }

    /// Lists loaded after a handshake for `role`.
    #[must_use]
    pub fn initial_for(role: Option<Role>) -> &'static [Self] {
        match role {
            Some(Role::Driver) => &[Self::RideRequests, Self::AssignedRides],
            Some(Role::Rider) => &[Self::MyRides],
            None => &[Self::MyRides, Self::RideRequests, Self::AssignedRides],
        }
    }
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MyRides => f.write_str("my_rides"),
            Self::RideRequests => f.write_str("ride_requests"),
            Self::AssignedRides => f.write_str("assigned_rides"),
        }
    }
}

// ============================================================================
// RideView
// ============================================================================

/// Presentation callbacks. Every method defaults to a no-op.
pub trait RideView: Send + Sync {
    /// Connection indicator changed.
    fn status(&self, _status: ConnectionStatus) {}

    /// A notice should be shown.
    fn notify(&self, _notice: Notice) {}

    /// A ride list was (re)loaded.
    fn show_rides(&self, _target: RefreshTarget, _rides: &[Ride]) {}
}

/// View that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullView;

impl RideView for NullView {}

// ============================================================================
// Refresher
// ============================================================================

/// Schedules reloading of a ride list.
///
/// Implementations must not block; the router calls them inline.
pub trait Refresher: Send + Sync {
    /// Reloads `target` after `delay`.
    fn refresh(&self, target: RefreshTarget, delay: Duration);
}

/// Refresher that ignores every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

impl Refresher for NoRefresh {
    fn refresh(&self, _target: RefreshTarget, _delay: Duration) {}
}

// ============================================================================
// Tests
// ============================================================================
