//! Connection state machine and reconnection policy.
//!
//! [`StateMachine`] is the pure core of the transport: it owns the
//! connection state, the attempt counter and the pending reconnect ticket,
//! and decides every transition. It performs no I/O, so the runtime in
//! [`Transport`](super::Transport) only executes what it returns.
//!
//! # Transitions
//!
//! ```text
//!            begin_connect                on_open
//!   Idle ───────────────────► Connecting ─────────► Open
//!    ▲                           │  ▲                 │
//!    │                  on_close │  │ begin_connect   │ on_close
//!    │                           ▼  │ (timer due)     ▼
//!    │                         Closed ◄───────────────┘
//!    │                           ▲
//!    └── begin_disconnect ─► Closing
//! ```
//!
//! # Epochs
//!
//! Every connect attempt and every disconnect bumps the epoch. Signals
//! carry the epoch of the connection that produced them; signals from an
//! older epoch are ignored, so a torn-down attempt can never move the
//! current state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tracing::{debug, trace};

// ============================================================================
// Constants
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// No status code was present in the close frame.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Policy violation; the server uses it to reject credentials.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Default base reconnect delay.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(3000);

/// Default reconnect delay cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Default number of reconnect attempts before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Channel usable.
    Open,
    /// Explicit disconnect in progress.
    Closing,
    /// Not connected; a reconnect may be pending.
    Closed,
}

impl ConnectionState {
    /// Returns `true` for `Connecting` and `Open`.
    #[inline]
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Returns `true` if a close code forbids reconnecting.
#[inline]
#[must_use]
pub const fn is_terminal_close(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_POLICY_VIOLATION)
}

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Linear-with-cap reconnection backoff.
///
/// The delay for attempt `n` (1-based) is `min(n * base_delay, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit multiplied by the attempt number.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Reconnects allowed after consecutive abnormal closures.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}

impl ReconnectPolicy {
    /// Creates a policy.
    #[inline]
    #[must_use]
    pub const fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Returns the delay before reconnect attempt `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

// ============================================================================
// PendingReconnect
// ============================================================================

/// A scheduled reconnect attempt.
///
/// Acts as a ticket: only the ticket currently held by the state machine
/// may start a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReconnect {
    /// Attempt number this timer belongs to (1-based).
    pub attempt: u32,
    /// Delay before the attempt.
    pub delay: Duration,
    /// Epoch of the connection whose closure scheduled it.
    pub(crate) epoch: u64,
}

// ============================================================================
// CloseOutcome
// ============================================================================

/// Decision taken when a connection closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Signal from a stale connection; nothing changed.
    Ignored,
    /// Normal or auth-rejected closure; no reconnect.
    Terminal,
    /// Abnormal closure; reconnect scheduled.
    Reconnect(PendingReconnect),
    /// Abnormal closure with the attempt budget spent.
    Exhausted,
}

// ============================================================================
// StateMachine
// ============================================================================

/// Pure transport state machine.
#[derive(Debug, Clone)]
pub struct StateMachine {
    /// Backoff policy.
    policy: ReconnectPolicy,
    /// Current state.
    state: ConnectionState,
    /// Reconnects since the last successful open.
    attempt_count: u32,
    /// Identity of the current connection attempt.
    epoch: u64,
    /// Outstanding reconnect, at most one.
    pending: Option<PendingReconnect>,
}

impl StateMachine {
    /// Creates an idle state machine.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            attempt_count: 0,
            epoch: 0,
            pending: None,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the number of reconnects since the last open.
    #[inline]
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Returns the current epoch.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the outstanding reconnect, if any.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> Option<PendingReconnect> {
        self.pending
    }

    /// Returns the backoff policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Starts a connect attempt and returns its epoch.
    ///
    /// Any pending reconnect is cancelled and any live attempt becomes
    /// stale. A `manual` request also restores the full attempt budget.
    pub fn begin_connect(&mut self, manual: bool) -> u64 {
        self.pending = None;
        if manual {
            self.attempt_count = 0;
        }
        self.epoch += 1;
        self.state = ConnectionState::Connecting;

        debug!(
            epoch = self.epoch,
            attempt = self.attempt_count,
            manual,
            "Connect attempt started"
        );
        self.epoch
    }

    /// Applies a successful handshake. Returns `false` for stale signals.
    pub fn on_open(&mut self, epoch: u64) -> bool {
        if epoch != self.epoch || self.state != ConnectionState::Connecting {
            trace!(epoch, current = self.epoch, "Ignoring stale open");
            return false;
        }

        self.state = ConnectionState::Open;
        self.attempt_count = 0;
        self.pending = None;
        true
    }

    /// Checks a transport error against the current epoch.
    ///
    /// Errors never change state; only the closure that follows does.
    #[must_use]
    pub fn on_error(&self, epoch: u64) -> bool {
        epoch == self.epoch && self.state.is_live()
    }

    /// Applies a closure and decides whether to reconnect.
    pub fn on_close(&mut self, epoch: u64, code: u16) -> CloseOutcome {
        if epoch != self.epoch || !self.state.is_live() {
            trace!(epoch, current = self.epoch, code, "Ignoring stale close");
            return CloseOutcome::Ignored;
        }

        self.state = ConnectionState::Closed;

        if is_terminal_close(code) {
            self.pending = None;
            return CloseOutcome::Terminal;
        }

        if self.attempt_count >= self.policy.max_attempts {
            self.pending = None;
            return CloseOutcome::Exhausted;
        }

        self.attempt_count += 1;
        let pending = PendingReconnect {
            attempt: self.attempt_count,
            delay: self.policy.delay_for(self.attempt_count),
            epoch,
        };
        self.pending = Some(pending);

        CloseOutcome::Reconnect(pending)
    }

    /// Consumes `ticket` if it is still the outstanding reconnect.
    ///
    /// Returns `false` if the reconnect was cancelled or superseded.
    pub fn take_due(&mut self, ticket: &PendingReconnect) -> bool {
        if self.pending.as_ref() == Some(ticket) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Applies an explicit disconnect.
    ///
    /// Always terminal: cancels any pending reconnect and invalidates the
    /// current attempt. Returns `true` if a connection was live.
    pub fn begin_disconnect(&mut self) -> bool {
        self.pending = None;
        self.epoch += 1;

        let was_live = self.state.is_live();
        if was_live {
            self.state = ConnectionState::Closing;
        }
        was_live
    }

    /// Completes an explicit disconnect started by [`begin_disconnect`].
    ///
    /// [`begin_disconnect`]: Self::begin_disconnect
    pub fn finish_disconnect(&mut self) {
        if self.state != ConnectionState::Idle {
            self.state = ConnectionState::Closed;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
