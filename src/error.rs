//! Error types for the ride-sync client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ride_sync::{Client, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     client.request_ride("Airport", "Downtown").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::MissingCredential`] |
//! | Connection | [`Error::Connection`], [`Error::HandshakeRejected`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Protocol | [`Error::Protocol`] |
//! | Command | [`Error::Api`], [`Error::Network`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Constants
// ============================================================================

/// Text shown to users when a request fails without a server explanation.
pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please try again.";

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No credential is available.
    ///
    /// Returned by connect attempts and fallback requests made before
    /// the authentication flow supplied a token.
    #[error("No credential available, please log in first")]
    MissingCredential,

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Realtime connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Server answered the realtime upgrade with an HTTP error.
    #[error("Handshake rejected with status {status}")]
    HandshakeRejected {
        /// HTTP status of the upgrade response.
        status: u16,
    },

    /// Realtime handshake did not finish in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Realtime connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Realtime channel is not open.
    #[error("Realtime channel is not open")]
    NotConnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or unexpected realtime frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// Fallback request answered with a non-2xx status.
    ///
    /// `detail` carries the server-provided explanation when one was sent.
    #[error("Request failed with status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Human-readable `detail` field from the response body.
        detail: Option<String>,
    },

    /// Fallback request failed before a response arrived.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an API error from a status code and optional detail.
    #[inline]
    pub fn api(status: u16, detail: Option<String>) -> Self {
        Self::Api { status, detail }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the server rejected the credential.
    ///
    /// A 403 on the fallback surface means the role lacks access, so only
    /// the realtime upgrade treats it as a rejected credential.
    #[inline]
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Api { status: 401, .. }
                | Self::HandshakeRejected {
                    status: 401 | 403
                }
                | Self::MissingCredential
        )
    }

    /// Returns the message a user interface should display for this error.
    ///
    /// Server-provided `detail` text wins; network failures get a
    /// generic retry hint.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Api { status, .. } => format!("Request failed ({status})"),
            Self::Network(_) => NETWORK_ERROR_MESSAGE.to_string(),
            Self::MissingCredential => "Please login first".to_string(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
