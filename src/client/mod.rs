//! Client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Wires session, transport, router and dispatcher |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Endpoints, timeouts and backoff |
//!
//! # Example
//!
//! ```no_run
//! use ride_sync::{Client, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = Client::builder()
//!     .base_url("http://localhost:8000")
//!     .credential("eyJhbGciOi...")
//!     .build()?;
//!
//! client.connect()?;
//! client.assign_ride(42).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Client options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
pub use options::{ClientOptions, DEFAULT_BASE_URL};
