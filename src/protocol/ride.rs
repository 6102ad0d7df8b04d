//! Ride representation returned by the fallback surface.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{RideId, UserId};

// ============================================================================
// RideStatus
// ============================================================================

/// Lifecycle status of a ride, as reported by the server.
///
/// The server is the status authority; unknown values are preserved as
/// [`RideStatus::Unknown`] instead of failing the whole listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    /// Waiting for a driver.
    Requested,
    /// Accepted by a driver.
    Assigned,
    /// Finished.
    Completed,
    /// Status this client does not know about.
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Ride
// ============================================================================

/// A ride as listed or returned by the fallback surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ride {
    /// Ride ID.
    pub id: RideId,

    /// Rider who requested the ride.
    pub user_id: UserId,

    /// Driver who accepted the ride, once assigned.
    #[serde(default)]
    pub driver_id: Option<UserId>,

    /// Pickup location.
    pub pickup: String,

    /// Dropoff location.
    pub dropoff: String,

    /// Current status.
    pub status: RideStatus,

    /// Creation timestamp as sent by the server.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Ride {
    /// Returns `true` if the ride is still waiting for a driver.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == RideStatus::Requested
    }
}

// ============================================================================
// Tests
// ============================================================================
