//! Realtime transport layer.
//!
//! This module owns the client's single WebSocket connection to the
//! dispatch server, its lifecycle and its reconnection policy.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────┐                      ┌─────────────────┐
//! │  Transport            │                      │  Dispatch       │
//! │                       │      WebSocket       │  server         │
//! │  StateMachine         │◄────────────────────►│                 │
//! │  signal pump          │  /ws?token=<cred>    │  /ws endpoint   │
//! │  → Connection         │                      │                 │
//! └───────────────────────┘                      └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Transport::connect` - Start an attempt with the session credential
//! 2. `Connection::open` - Client handshake, bounded by the connect timeout
//! 3. `Connection` - Send frames, forward received frames to the router
//! 4. Abnormal closure - Reconnect after `min(attempt * base, max)`
//! 5. `Transport::disconnect` - Close with code 1000, no reconnect
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `state` | Pure state machine and backoff policy |
//! | `connection` | WebSocket connection and event loop |
//! | `core` | Transport runtime and lifecycle notifications |

// ============================================================================
// Submodules
// ============================================================================

/// Pure state machine and backoff policy.
pub mod state;

/// WebSocket connection and event loop.
mod connection;

/// Transport runtime.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{
    InboundHandler, LifecycleEvent, LifecycleHandler, Transport, TransportConfig, WeakTransport,
};
pub use state::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, CloseOutcome,
    ConnectionState, PendingReconnect, ReconnectPolicy, StateMachine, is_terminal_close,
};
