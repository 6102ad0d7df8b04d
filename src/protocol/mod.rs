//! Wire message types.
//!
//! This module defines the frames exchanged with the dispatch server over
//! the realtime channel and the request shapes of the fallback surface.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`RideCommand`] | Client → Server | User action (`{"action": ..., ...}`) |
//! | [`InboundEvent`] | Server → Client | Push notification (`{"event": ..., ...}`) |
//! | [`FallbackRequest`] | Client → Server | Same action over request/response |
//! | [`Ride`] | Server → Client | Ride representation from the fallback surface |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound action frames |
//! | `event` | Inbound event decoding |
//! | `request` | Fallback request derivation |
//! | `ride` | Ride representation |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound action frames.
pub mod command;

/// Inbound event decoding.
pub mod event;

/// Fallback request shapes.
pub mod request;

/// Ride representation.
pub mod ride;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::RideCommand;
pub use event::{EventKind, InboundEvent};
pub use request::{FallbackRequest, HttpMethod};
pub use ride::{Ride, RideStatus};
