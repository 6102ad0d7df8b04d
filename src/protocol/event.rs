//! Inbound event decoding.
//!
//! Events are pushed by the server over the realtime channel. Each frame is
//! a JSON object whose `event` field names the kind:
//!
//! ```json
//! { "event": "connected", "user_id": 42, "is_driver": true, "message": "..." }
//! { "event": "new_ride", "ride_id": 7, "pickup": "A", "dropoff": "B", "user_id": 3 }
//! { "event": "ride_completed_success", "ride_id": 7 }
//! ```
//!
//! # Event Kinds
//!
//! | Wire name | Kind | Audience |
//! |-----------|------|----------|
//! | `connected` | [`EventKind::Connected`] | everyone (handshake) |
//! | `new_ride`, `type: ride_created` | [`EventKind::NewRide`] | drivers |
//! | `ride_created` | [`EventKind::RideCreated`] | requesting rider |
//! | `ride_assigned` | [`EventKind::RideAssigned`] | rider |
//! | `ride_assigned_success` | [`EventKind::RideAssignedSuccess`] | driver |
//! | `ride_completed`, `ride_completed_success` | [`EventKind::RideCompleted`] | both |
//! | `error` | [`EventKind::Error`] | sender |
//! | `pong` | [`EventKind::Pong`] | heartbeat sender |
//!
//! Unrecognized names decode to [`InboundEvent::Unknown`] so that new server
//! events never break the client. A frame without `event` is recognized only
//! as `type: ride_created`; every other `type` value decodes to `Unknown`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::{Map, Value, from_str};

use crate::error::{Error, Result};
use crate::identifiers::{RideId, UserId};

// ============================================================================
// EventKind
// ============================================================================

/// Recognized inbound event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Handshake acknowledgement carrying identity.
    Connected,
    /// A new ride request is open (drivers).
    NewRide,
    /// The caller's ride request was created.
    RideCreated,
    /// The caller's ride was accepted by a driver.
    RideAssigned,
    /// The calling driver's accept succeeded.
    RideAssignedSuccess,
    /// A ride was completed (either side).
    RideCompleted,
    /// Server-side error report.
    Error,
    /// Heartbeat answer.
    Pong,
}

impl EventKind {
    /// All recognized kinds.
    pub const ALL: [Self; 8] = [
        Self::Connected,
        Self::NewRide,
        Self::RideCreated,
        Self::RideAssigned,
        Self::RideAssignedSuccess,
        Self::RideCompleted,
        Self::Error,
        Self::Pong,
    ];

    /// Resolves a wire name to a kind.
    ///
    /// `ride_completed` and `ride_completed_success` are two spellings of
    /// the same kind.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "connected" => Some(Self::Connected),
            "new_ride" => Some(Self::NewRide),
            "ride_created" => Some(Self::RideCreated),
            "ride_assigned" => Some(Self::RideAssigned),
            "ride_assigned_success" => Some(Self::RideAssignedSuccess),
            "ride_completed" | "ride_completed_success" => Some(Self::RideCompleted),
            "error" => Some(Self::Error),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::NewRide => "new_ride",
            Self::RideCreated => "ride_created",
            Self::RideAssigned => "ride_assigned",
            Self::RideAssignedSuccess => "ride_assigned_success",
            Self::RideCompleted => "ride_completed",
            Self::Error => "error",
            Self::Pong => "pong",
        };
        f.write_str(name)
    }
}

// ============================================================================
// InboundEvent
// ============================================================================

/// A decoded server push.
///
/// Fields the server omitted (or sent with an unexpected type) decode to
/// `None`; handlers decide whether the event is still actionable.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Handshake acknowledgement.
    Connected {
        /// Authenticated subject.
        user_id: Option<UserId>,
        /// Role flag.
        is_driver: Option<bool>,
        /// Server greeting.
        message: Option<String>,
    },

    /// New open ride request.
    NewRide {
        /// Ride ID.
        ride_id: Option<RideId>,
        /// Pickup location.
        pickup: Option<String>,
        /// Dropoff location.
        dropoff: Option<String>,
        /// Requesting rider.
        rider_id: Option<UserId>,
    },

    /// Ride request confirmation.
    RideCreated {
        /// Ride ID.
        ride_id: Option<RideId>,
        /// Server message.
        message: Option<String>,
    },

    /// Ride accepted by a driver.
    RideAssigned {
        /// Ride ID.
        ride_id: Option<RideId>,
        /// Accepting driver.
        driver_id: Option<UserId>,
    },

    /// Accept confirmation for the driver.
    RideAssignedSuccess {
        /// Ride ID.
        ride_id: Option<RideId>,
    },

    /// Ride completed.
    RideCompleted {
        /// Ride ID.
        ride_id: Option<RideId>,
        /// `true` for the completing driver's `ride_completed_success`.
        confirmation: bool,
    },

    /// Server-side error report.
    Error {
        /// Error message.
        message: Option<String>,
    },

    /// Heartbeat answer.
    Pong,

    /// Event kind this client does not know.
    Unknown {
        /// Wire name.
        name: String,
        /// Full frame.
        payload: Value,
    },
}

impl InboundEvent {
    /// Decodes a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the frame is not a JSON object or
    /// carries no event name. Unknown names are not errors.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value =
            from_str(raw).map_err(|e| Error::protocol(format!("invalid JSON frame: {e}")))?;

        let Value::Object(object) = value else {
            return Err(Error::protocol("frame is not a JSON object"));
        };

        let fields = Fields(&object);

        let name = match (fields.get_str("event"), fields.get_str("type")) {
            (Some(event), _) => event,
            // Legacy broadcast shape for new ride requests
            (None, Some("ride_created")) => "new_ride",
            // No other `type` value names an event
            (None, Some(other)) => {
                return Ok(Self::Unknown {
                    name: other.to_string(),
                    payload: Value::Object(object.clone()),
                });
            }
            (None, None) => return Err(Error::protocol("frame carries no event name")),
        };

        let event = match EventKind::from_name(name) {
            Some(EventKind::Connected) => Self::Connected {
                user_id: fields.get_id("user_id").map(UserId::new),
                is_driver: fields.get_bool("is_driver"),
                message: fields.get_string("message"),
            },
            Some(EventKind::NewRide) => Self::NewRide {
                ride_id: fields.get_id("ride_id").map(RideId::new),
                pickup: fields.get_string("pickup"),
                dropoff: fields.get_string("dropoff"),
                rider_id: fields.get_id("user_id").map(UserId::new),
            },
            Some(EventKind::RideCreated) => Self::RideCreated {
                ride_id: fields.get_id("ride_id").map(RideId::new),
                message: fields.get_string("message"),
            },
            Some(EventKind::RideAssigned) => Self::RideAssigned {
                ride_id: fields.get_id("ride_id").map(RideId::new),
                driver_id: fields.get_id("driver_id").map(UserId::new),
            },
            Some(EventKind::RideAssignedSuccess) => Self::RideAssignedSuccess {
                ride_id: fields.get_id("ride_id").map(RideId::new),
            },
            Some(EventKind::RideCompleted) => Self::RideCompleted {
                ride_id: fields.get_id("ride_id").map(RideId::new),
                confirmation: name == "ride_completed_success",
            },
            Some(EventKind::Error) => Self::Error {
                message: fields.get_string("message"),
            },
            Some(EventKind::Pong) => Self::Pong,
            None => Self::Unknown {
                name: name.to_string(),
                payload: Value::Object(object.clone()),
            },
        };

        Ok(event)
    }

    /// Returns the recognized kind, or `None` for [`InboundEvent::Unknown`].
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Connected { .. } => Some(EventKind::Connected),
            Self::NewRide { .. } => Some(EventKind::NewRide),
            Self::RideCreated { .. } => Some(EventKind::RideCreated),
            Self::RideAssigned { .. } => Some(EventKind::RideAssigned),
            Self::RideAssignedSuccess { .. } => Some(EventKind::RideAssignedSuccess),
            Self::RideCompleted { .. } => Some(EventKind::RideCompleted),
            Self::Error { .. } => Some(EventKind::Error),
            Self::Pong => Some(EventKind::Pong),
            Self::Unknown { .. } => None,
        }
    }

    /// Returns the ride this event refers to, if any.
    #[must_use]
    pub fn ride_id(&self) -> Option<RideId> {
        match self {
            Self::NewRide { ride_id, .. }
            | Self::RideCreated { ride_id, .. }
            | Self::RideAssigned { ride_id, .. }
            | Self::RideAssignedSuccess { ride_id }
            | Self::RideCompleted { ride_id, .. } => *ride_id,
            _ => None,
        }
    }
}

// ============================================================================
// Field Access
// ============================================================================

/// Typed accessors over a frame's JSON object.
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    /// Gets a borrowed string.
    #[inline]
    fn get_str(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Gets an owned string.
    #[inline]
    fn get_string(&self, key: &str) -> Option<String> {
        self.get_str(key).map(str::to_string)
    }

    /// Gets a boolean.
    #[inline]
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Gets a numeric id, accepting numbers and numeric strings.
    fn get_id(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
