//! Transport runtime.
//!
//! [`Transport`] owns the realtime connection of one client. Its state
//! lives in a [`StateMachine`]; this module executes the machine's
//! decisions: opening sockets, arming the reconnect timer and notifying
//! listeners.
//!
//! # Signal Pump
//!
//! Connection tasks, open attempts and the reconnect timer never touch the
//! state directly. They post a [`Signal`] into one channel and a single
//! pump task applies the signals in order. Explicit calls (`connect`,
//! `disconnect`) take the same lock for a short, non-async critical
//! section. Callbacks always run with the lock released, so a handler may
//! call back into the transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::session::{Credential, Session};

use super::connection::Connection;
use super::state::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, CloseOutcome, ConnectionState,
    PendingReconnect, ReconnectPolicy, StateMachine,
};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the WebSocket handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameter carrying the credential.
const TOKEN_PARAM: &str = "token";

/// Close reason sent on explicit disconnect.
const DISCONNECT_REASON: &str = "Manual disconnect";

// ============================================================================
// Types
// ============================================================================

/// Lifecycle listener callback.
pub type LifecycleHandler = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Receiver of raw inbound text frames.
pub type InboundHandler = Arc<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// LifecycleEvent
// ============================================================================

/// Notification about the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The state changed.
    StateChanged(ConnectionState),
    /// The channel opened. Precedes the handshake acknowledgement.
    Connected,
    /// A transport-level error. Not a closure.
    Error {
        /// Error description.
        message: String,
    },
    /// The connection went away.
    Disconnected {
        /// `true` for an explicit disconnect; never shown as an error.
        intentional: bool,
        /// Close code, if one was observed.
        code: Option<u16>,
    },
    /// A reconnect attempt was scheduled.
    ReconnectScheduled {
        /// Attempt number (1-based).
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Reconnect attempts are used up until the next manual connect.
    Exhausted,
}

// ============================================================================
// Signal
// ============================================================================

/// Input to the signal pump.
#[derive(Debug)]
pub(crate) enum Signal {
    /// Handshake succeeded.
    Opened { epoch: u64, connection: Connection },
    /// Text frame received.
    Message { epoch: u64, text: String },
    /// Transport error.
    Error { epoch: u64, message: String },
    /// Connection closed or could not be opened.
    Closed {
        epoch: u64,
        code: u16,
        reason: String,
    },
    /// Reconnect timer fired.
    ReconnectDue { ticket: PendingReconnect },
}

/// What started a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Explicit `connect`. Restores the reconnect budget.
    Manual,
    /// Reconnect timer.
    Timer,
    /// `ensure_connected`. Skipped while `Connecting` or `Open`.
    Demand,
}

// ============================================================================
// TransportConfig
// ============================================================================

/// Settings for a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Reconnection backoff.
    pub policy: ReconnectPolicy,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    /// Ping period, `None` to disable.
    pub heartbeat: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            heartbeat: None,
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Realtime transport with automatic reconnection.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

/// Non-owning handle to a [`Transport`].
///
/// Does not keep the connection alive. Obtained from [`Transport::downgrade`].
#[derive(Clone)]
pub struct WeakTransport {
    inner: Weak<TransportInner>,
}

/// Mutable transport state.
struct Core {
    /// Lifecycle decisions.
    machine: StateMachine,
    /// Live connection, present only while `Open`.
    connection: Option<Connection>,
    /// Armed reconnect timer.
    timer: Option<JoinHandle<()>>,
}

/// Shared transport internals.
struct TransportInner {
    /// Realtime endpoint without credential.
    endpoint: Url,
    /// Credential source.
    session: Session,
    /// Settings.
    config: TransportConfig,
    /// State, connection and timer.
    core: Mutex<Core>,
    /// Lifecycle listeners.
    listeners: RwLock<Vec<LifecycleHandler>>,
    /// Inbound frame receiver.
    inbound: RwLock<Option<InboundHandler>>,
    /// Signal pump input.
    signal_tx: mpsc::UnboundedSender<Signal>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("state", &self.state())
            .field("attempt_count", &self.attempt_count())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for WeakTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTransport")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

// ============================================================================
// Transport - Constructors
// ============================================================================

impl Transport {
    /// Creates an idle transport for `endpoint`.
    ///
    /// `endpoint` is the realtime URL without credential, e.g.
    /// `ws://localhost:8000/ws`. The credential is read from `session` on
    /// every attempt.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(endpoint: Url, session: Session, config: TransportConfig) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(TransportInner {
            endpoint,
            session,
            config,
            core: Mutex::new(Core {
                machine: StateMachine::new(config.policy),
                connection: None,
                timer: None,
            }),
            listeners: RwLock::new(Vec::new()),
            inbound: RwLock::new(None),
            signal_tx,
        });

        tokio::spawn(run_signal_pump(Arc::downgrade(&inner), signal_rx));

        Self { inner }
    }

    /// Returns a handle that does not keep this transport alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakTransport {
        WeakTransport {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl WeakTransport {
    /// Returns the transport if it still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<Transport> {
        self.inner.upgrade().map(|inner| Transport { inner })
    }
}

// ============================================================================
// Transport - Lifecycle
// ============================================================================

impl Transport {
    /// Starts a connect attempt, tearing down any live one.
    ///
    /// Also restores the full reconnect budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if the session has no credential.
    pub fn connect(&self) -> Result<()> {
        let credential = self
            .inner
            .session
            .credential()
            .ok_or(Error::MissingCredential)?;

        self.inner.start_attempt(&credential, Trigger::Manual);
        Ok(())
    }

    /// Connects unless already `Connecting` or `Open`.
    ///
    /// Safe to call repeatedly. Returns `true` if an attempt was started.
    pub fn ensure_connected(&self) -> bool {
        let Some(credential) = self.inner.session.credential() else {
            trace!("No credential, not connecting");
            return false;
        };

        self.inner.start_attempt(&credential, Trigger::Demand)
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn disconnect(&self) {
        let (was_live, had_pending, connection) = {
            let mut core = self.inner.core.lock();
            if let Some(timer) = core.timer.take() {
                timer.abort();
            }
            let had_pending = core.machine.pending().is_some();
            let was_live = core.machine.begin_disconnect();
            (was_live, had_pending, core.connection.take())
        };

        if was_live {
            self.inner
                .emit(&LifecycleEvent::StateChanged(ConnectionState::Closing));
        }

        if let Some(connection) = connection {
            connection.close(CLOSE_NORMAL, DISCONNECT_REASON);
        }

        self.inner.core.lock().machine.finish_disconnect();

        if was_live || had_pending {
            info!("Realtime connection closed by client");
            self.inner
                .emit(&LifecycleEvent::StateChanged(ConnectionState::Closed));
            self.inner.emit(&LifecycleEvent::Disconnected {
                intentional: true,
                code: Some(CLOSE_NORMAL),
            });
        }
    }
}

// ============================================================================
// Transport - Accessors
// ============================================================================

impl Transport {
    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.core.lock().machine.state()
    }

    /// Returns `true` if the channel is usable.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the number of reconnects since the last open.
    #[inline]
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.inner.core.lock().machine.attempt_count()
    }

    /// Returns the outstanding reconnect, if any.
    #[inline]
    #[must_use]
    pub fn pending_reconnect(&self) -> Option<PendingReconnect> {
        self.inner.core.lock().machine.pending()
    }

    /// Returns the realtime endpoint without credential.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

// ============================================================================
// Transport - Messaging
// ============================================================================

impl Transport {
    /// Sends a text frame on the open channel.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the state is not `Open`
    /// - [`Error::ConnectionClosed`] if the channel closed during the send
    /// - [`Error::WebSocket`] if the write fails
    pub async fn send_text(&self, text: String) -> Result<()> {
        let connection = {
            let core = self.inner.core.lock();
            match (&core.connection, core.machine.state()) {
                (Some(connection), ConnectionState::Open) => connection.clone(),
                _ => return Err(Error::NotConnected),
            }
        };

        connection.send(text).await
    }

    /// Registers a lifecycle listener.
    pub fn subscribe(&self, handler: impl Fn(&LifecycleEvent) + Send + Sync + 'static) {
        self.inner.listeners.write().push(Arc::new(handler));
    }

    /// Sets the receiver of inbound text frames, replacing any previous one.
    pub fn set_inbound_handler(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        *self.inner.inbound.write() = Some(Arc::new(handler));
    }
}

// ============================================================================
// TransportInner
// ============================================================================

impl TransportInner {
    /// Begins a connect attempt under a fresh epoch.
    ///
    /// Returns `false` if `trigger` is [`Trigger::Demand`] and an attempt or
    /// connection is already live. The check and the epoch bump share one
    /// critical section.
    fn start_attempt(&self, credential: &Credential, trigger: Trigger) -> bool {
        let (epoch, stale) = {
            let mut core = self.core.lock();
            if trigger == Trigger::Demand && core.machine.state().is_live() {
                trace!("Already connecting or open");
                return false;
            }
            if let Some(timer) = core.timer.take() {
                timer.abort();
            }
            let stale = core.connection.take();
            (core.machine.begin_connect(trigger == Trigger::Manual), stale)
        };

        if let Some(stale) = stale {
            debug!("Tearing down previous connection");
            stale.close(CLOSE_NORMAL, "Superseded");
        }

        self.session.invalidate_identity();
        self.emit(&LifecycleEvent::StateChanged(ConnectionState::Connecting));

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair(TOKEN_PARAM, credential.expose());

        info!(endpoint = %self.endpoint, token = "<redacted>", epoch, "Connecting");

        let signal_tx = self.signal_tx.clone();
        let TransportConfig {
            connect_timeout,
            heartbeat,
            ..
        } = self.config;

        tokio::spawn(async move {
            match Connection::open(&url, connect_timeout).await {
                Ok(stream) => {
                    Connection::spawn(stream, epoch, signal_tx, heartbeat);
                }
                Err(e) => {
                    // Rejected credentials close as a policy violation, which is terminal
                    let code = if e.is_unauthorized() {
                        CLOSE_POLICY_VIOLATION
                    } else {
                        CLOSE_ABNORMAL
                    };
                    let _ = signal_tx.send(Signal::Error {
                        epoch,
                        message: e.to_string(),
                    });
                    let _ = signal_tx.send(Signal::Closed {
                        epoch,
                        code,
                        reason: String::new(),
                    });
                }
            }
        });

        true
    }

    /// Applies one signal.
    fn apply(&self, signal: Signal) {
        match signal {
            Signal::Opened { epoch, connection } => self.on_opened(epoch, connection),
            Signal::Message { epoch, text } => self.on_message(epoch, &text),
            Signal::Error { epoch, message } => {
                if self.core.lock().machine.on_error(epoch) {
                    warn!(epoch, %message, "Transport error");
                    self.emit(&LifecycleEvent::Error { message });
                }
            }
            Signal::Closed {
                epoch,
                code,
                reason,
            } => self.on_closed(epoch, code, &reason),
            Signal::ReconnectDue { ticket } => self.on_reconnect_due(&ticket),
        }
    }

    fn on_opened(&self, epoch: u64, connection: Connection) {
        let accepted = {
            let mut core = self.core.lock();
            let accepted = core.machine.on_open(epoch);
            if accepted {
                core.connection = Some(connection.clone());
            }
            accepted
        };

        if !accepted {
            connection.close(CLOSE_NORMAL, "Superseded");
            return;
        }

        info!(epoch, "Realtime connection open");
        self.emit(&LifecycleEvent::StateChanged(ConnectionState::Open));
        self.emit(&LifecycleEvent::Connected);
    }

    fn on_message(&self, epoch: u64, text: &str) {
        {
            let core = self.core.lock();
            if core.machine.epoch() != epoch || core.machine.state() != ConnectionState::Open {
                trace!(epoch, "Dropping frame from stale connection");
                return;
            }
        }

        let handler = self.inbound.read().clone();
        if let Some(handler) = handler
            && catch_unwind(AssertUnwindSafe(|| handler(text))).is_err()
        {
            error!(epoch, "Inbound handler panicked");
        }
    }

    fn on_closed(&self, epoch: u64, code: u16, reason: &str) {
        let outcome = {
            let mut core = self.core.lock();
            let outcome = core.machine.on_close(epoch, code);
            if outcome != CloseOutcome::Ignored {
                core.connection = None;
            }
            if let CloseOutcome::Reconnect(ticket) = outcome {
                core.timer = Some(self.arm_timer(ticket));
            }
            outcome
        };

        if outcome == CloseOutcome::Ignored {
            return;
        }

        info!(epoch, code, reason, "Realtime connection closed");
        self.emit(&LifecycleEvent::StateChanged(ConnectionState::Closed));
        self.emit(&LifecycleEvent::Disconnected {
            intentional: false,
            code: Some(code),
        });

        match outcome {
            CloseOutcome::Reconnect(ticket) => {
                info!(
                    attempt = ticket.attempt,
                    delay_ms = ticket.delay.as_millis() as u64,
                    "Reconnect scheduled"
                );
                self.emit(&LifecycleEvent::ReconnectScheduled {
                    attempt: ticket.attempt,
                    delay: ticket.delay,
                });
            }
            CloseOutcome::Exhausted => {
                error!(
                    max_attempts = self.config.policy.max_attempts,
                    "Reconnection attempts exhausted"
                );
                self.emit(&LifecycleEvent::Exhausted);
            }
            CloseOutcome::Terminal | CloseOutcome::Ignored => {}
        }
    }

    fn on_reconnect_due(&self, ticket: &PendingReconnect) {
        {
            let mut core = self.core.lock();
            if !core.machine.take_due(ticket) {
                trace!(attempt = ticket.attempt, "Reconnect ticket no longer valid");
                return;
            }
            core.timer = None;
        }

        match self.session.credential() {
            Some(credential) => {
                self.start_attempt(&credential, Trigger::Timer);
            }
            None => warn!("Credential removed, reconnect skipped"),
        }
    }

    /// Spawns the single reconnect timer for `ticket`.
    fn arm_timer(&self, ticket: PendingReconnect) -> JoinHandle<()> {
        let signal_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            sleep(ticket.delay).await;
            let _ = signal_tx.send(Signal::ReconnectDue { ticket });
        })
    }

    /// Notifies every listener, isolating panics.
    fn emit(&self, event: &LifecycleEvent) {
        let listeners: Vec<LifecycleHandler> = self.listeners.read().clone();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(?event, "Lifecycle listener panicked");
            }
        }
    }
}

/// Applies signals in arrival order until the transport is dropped.
async fn run_signal_pump(inner: Weak<TransportInner>, mut signal_rx: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = signal_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.apply(signal);
    }

    debug!("Signal pump terminated");
}

impl Drop for TransportInner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        if let Some(timer) = core.timer.take() {
            timer.abort();
        }
        if let Some(connection) = core.connection.take() {
            connection.close(CLOSE_NORMAL, DISCONNECT_REASON);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
