//! Outbound action frames.
//!
//! Every user action is one [`RideCommand`]. On the realtime channel it is
//! sent as a flat JSON envelope whose `action` field names the kind:
//!
//! ```json
//! { "action": "ride_requested", "pickup": "Airport", "dropoff": "Downtown" }
//! { "action": "ride_assigned", "ride_id": 7 }
//! { "action": "ride_completed", "ride_id": 7 }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::to_string;

use crate::error::Result;
use crate::identifiers::RideId;

// ============================================================================
// Constants
// ============================================================================

/// Keepalive frame; the server answers with `{"event":"pong"}`.
pub(crate) const PING_FRAME: &str = r#"{"action":"ping"}"#;

// ============================================================================
// RideCommand
// ============================================================================

/// A user-initiated ride action.
///
/// Ephemeral: a command exists only for the duration of one dispatch call
/// and is never queued or retried by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RideCommand {
    /// Rider asks for a ride.
    RideRequested {
        /// Pickup location.
        pickup: String,
        /// Dropoff location.
        dropoff: String,
    },

    /// Driver accepts an open ride request.
    RideAssigned {
        /// Ride being accepted.
        ride_id: RideId,
    },

    /// Driver finishes an assigned ride.
    RideCompleted {
        /// Ride being completed.
        ride_id: RideId,
    },
}

impl RideCommand {
    /// Creates a ride request command.
    #[inline]
    #[must_use]
    pub fn request(pickup: impl Into<String>, dropoff: impl Into<String>) -> Self {
        Self::RideRequested {
            pickup: pickup.into(),
            dropoff: dropoff.into(),
        }
    }

    /// Creates an assign command.
    #[inline]
    #[must_use]
    pub fn assign(ride_id: impl Into<RideId>) -> Self {
        Self::RideAssigned {
            ride_id: ride_id.into(),
        }
    }

    /// Creates a complete command.
    #[inline]
    #[must_use]
    pub fn complete(ride_id: impl Into<RideId>) -> Self {
        Self::RideCompleted {
            ride_id: ride_id.into(),
        }
    }

    /// Returns the wire name of the action.
    #[inline]
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::RideRequested { .. } => "ride_requested",
            Self::RideAssigned { .. } => "ride_assigned",
            Self::RideCompleted { .. } => "ride_completed",
        }
    }

    /// Returns the ride this command targets, if any.
    #[inline]
    #[must_use]
    pub fn ride_id(&self) -> Option<RideId> {
        match self {
            Self::RideRequested { .. } => None,
            Self::RideAssigned { ride_id } | Self::RideCompleted { ride_id } => Some(*ride_id),
        }
    }

    /// Serializes the command into a realtime text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
