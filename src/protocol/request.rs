//! Fallback request shapes.
//!
//! When the realtime channel is unavailable each [`RideCommand`] is sent as
//! a point-to-point request whose method and path derive from its kind:
//!
//! | Command | Method | Path | Body |
//! |---------|--------|------|------|
//! | `ride_requested` | `POST` | `rides/` | `{pickup, dropoff}` |
//! | `ride_assigned` | `GET` | `rides/{id}/assign` | none |
//! | `ride_completed` | `POST` | `rides/{id}/complete` | none |
//!
//! Listing requests carry no body. Paths are relative to the configured
//! base URL.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::{Value, json};

use super::RideCommand;

// ============================================================================
// Constants
// ============================================================================

/// Collection of all rides (create via `POST`, list via `GET`).
pub const RIDES_PATH: &str = "rides/";

/// Rides requested by the caller.
pub const MY_RIDES_PATH: &str = "rides/my";

/// Rides assigned to the calling driver (403 for riders).
pub const ASSIGNED_RIDES_PATH: &str = "rides/assigned";

// ============================================================================
// HttpMethod
// ============================================================================

/// HTTP method of a fallback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

// ============================================================================
// FallbackRequest
// ============================================================================

/// A request on the fallback surface, before authentication is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRequest {
    /// HTTP method.
    pub method: HttpMethod,

    /// Path relative to the base URL.
    pub path: String,

    /// JSON body, if any.
    pub body: Option<Value>,
}

impl FallbackRequest {
    /// Creates a body-less `GET` request.
    #[inline]
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
        }
    }

    /// Creates a `POST` request.
    #[inline]
    #[must_use]
    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body,
        }
    }
}

impl From<&RideCommand> for FallbackRequest {
    fn from(command: &RideCommand) -> Self {
        match command {
            RideCommand::RideRequested { pickup, dropoff } => Self::post(
                RIDES_PATH,
                Some(json!({ "pickup": pickup, "dropoff": dropoff })),
            ),
            RideCommand::RideAssigned { ride_id } => Self::get(format!("rides/{ride_id}/assign")),
            RideCommand::RideCompleted { ride_id } => {
                Self::post(format!("rides/{ride_id}/complete"), None)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
