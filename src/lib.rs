//! Ride Sync - Realtime client for a ride-dispatch service.
//!
//! This library keeps a rider or driver application in sync with the
//! dispatch server over a persistent WebSocket channel, and falls back to
//! request/response calls when the channel is unavailable.
//!
//! # Architecture
//!
//! The client follows a push model:
//!
//! - **Transport**: One realtime connection with bounded, linear backoff
//! - **Dispatcher**: Each user action goes over exactly one path
//! - **Router**: Each inbound event reaches exactly one handler
//! - **Session**: Credential in, confirmed identity out
//!
//! Key design principles:
//!
//! - At most one live connection per [`Transport`]
//! - Stale connection signals are discarded by epoch
//! - Identity is only trusted after the server's handshake
//! - Event-driven architecture (no polling)
//!
//! # Quick Start
//!
//! ```no_run
//! use ride_sync::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .base_url("http://localhost:8000")
//!         .credential("eyJhbGciOi...")
//!         .build()?;
//!
//!     client.connect()?;
//!
//!     // Realtime when open, request/response otherwise
//!     let accepted = client.request_ride("Airport", "Downtown").await?;
//!     println!("Realtime: {}", accepted.is_realtime());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client factory and configuration |
//! | [`dispatch`] | Command delivery and the fallback surface |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`router`] | Inbound event routing and presentation seams |
//! | [`session`] | Credential and identity |
//! | [`transport`] | Connection state machine and WebSocket plumbing |

// ============================================================================
// Modules
// ============================================================================

/// Client factory and configuration.
///
/// Use [`Client::builder()`] to create a configured client instance.
pub mod client;

/// Command delivery.
///
/// Chooses between the realtime channel and the fallback surface.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for rides and users.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire message types.
pub mod protocol;

/// Inbound event routing.
pub mod router;

/// Credential and identity.
pub mod session;

/// Realtime transport layer.
///
/// Connection state machine, reconnection policy and WebSocket event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientOptions};

// Dispatch types
pub use dispatch::{Accepted, ApiRefresher, Dispatcher, Fallback, RideApi};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RideId, UserId};

// Protocol types
pub use protocol::{EventKind, InboundEvent, Ride, RideCommand, RideStatus};

// Router types
pub use router::{
    ConnectionStatus, EventRouter, Notice, RefreshTarget, Refresher, RideView, RouteContext,
};

// Session types
pub use session::{Credential, FileSessionStore, Identity, Role, Session, SessionStore};

// Transport types
pub use transport::{ConnectionState, LifecycleEvent, ReconnectPolicy, Transport};
