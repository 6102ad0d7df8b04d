//! Session bridge: credential and identity.
//!
//! The [`Session`] holds the long-lived credential supplied by the
//! authentication flow and the identity facts learned from the server's
//! handshake acknowledgement. It never generates or refreshes tokens.
//!
//! # Identity Validity
//!
//! | Source | Accessor | Trust |
//! |--------|----------|-------|
//! | Handshake of the current connection | [`Session::identity`] | authoritative |
//! | Previous handshake (persisted) | [`Session::last_known_identity`] | hint |
//! | Fallback status check | [`Role::infer_from_status`] | heuristic |
//!
//! The confirmed identity is cleared at the start of every connect attempt
//! and becomes valid again only after the next handshake.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `identity` | Credential, identity and role types |
//! | `store` | Persistence across process restarts |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Credential, identity and role types.
pub mod identity;

/// Session persistence.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use identity::{Credential, Identity, Role};
pub use store::{FileSessionStore, PersistedSession, SessionStore};

// ============================================================================
// Types
// ============================================================================

/// Mutable session facts.
#[derive(Debug, Default)]
struct SessionState {
    /// Bearer credential.
    credential: Option<Credential>,
    /// Identity confirmed by the current connection's handshake.
    identity: Option<Identity>,
    /// Identity from an earlier handshake.
    last_known: Option<Identity>,
}

// ============================================================================
// Session
// ============================================================================

/// Shared handle to the session facts.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Clone, Default)]
pub struct Session {
    /// Shared state.
    state: Arc<RwLock<SessionState>>,
    /// Optional persistence backend.
    store: Option<Arc<dyn SessionStore>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("has_credential", &state.credential.is_some())
            .field("identity", &state.identity)
            .field("last_known", &state.last_known)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

// ============================================================================
// Session - Constructors
// ============================================================================

impl Session {
    /// Creates an in-memory session with no credential.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session backed by `store`, restoring persisted facts.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the persisted state cannot be read.
    pub fn with_store(store: Arc<dyn SessionStore>) -> Result<Self> {
        let persisted = store.load()?;

        let mut state = SessionState::default();
        if let Some(persisted) = persisted {
            debug!(
                has_identity = persisted.identity().is_some(),
                "Restored persisted session"
            );
            state.last_known = persisted.identity();
            state.credential = persisted.token.map(Credential::new);
        }

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            store: Some(store),
        })
    }
}

// ============================================================================
// Session - Credential
// ============================================================================

impl Session {
    /// Installs the credential obtained by the authentication flow.
    pub fn set_credential(&self, credential: Credential) {
        {
            let mut state = self.state.write();
            state.credential = Some(credential);
            state.identity = None;
            state.last_known = None;
        }
        info!("Credential installed");
        self.persist();
    }

    /// Returns the current credential.
    #[inline]
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.state.read().credential.clone()
    }

    /// Returns `true` if a credential is present.
    ///
    /// Gates auto-connect and reconnect-on-visibility logic.
    #[inline]
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.state.read().credential.is_some()
    }
}

// ============================================================================
// Session - Identity
// ============================================================================

impl Session {
    /// Returns the identity confirmed by the current connection's handshake.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.state.read().identity
    }

    /// Returns the identity from the most recent handshake, even if the
    /// current connection has not confirmed it yet.
    #[inline]
    #[must_use]
    pub fn last_known_identity(&self) -> Option<Identity> {
        let state = self.state.read();
        state.identity.or(state.last_known)
    }

    /// Returns the best known role: confirmed first, then last known.
    #[inline]
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.last_known_identity().map(|identity| identity.role)
    }

    /// Records the identity carried by a handshake acknowledgement.
    pub fn confirm_identity(&self, identity: Identity) {
        {
            let mut state = self.state.write();
            state.identity = Some(identity);
            state.last_known = Some(identity);
        }
        debug!(user_id = %identity.user_id, role = %identity.role, "Identity confirmed");
        self.persist();
    }

    /// Marks the confirmed identity stale.
    ///
    /// Called when a new connection attempt starts.
    pub fn invalidate_identity(&self) {
        self.state.write().identity = None;
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Forgets credential and identity, in memory and in the store.
    pub fn clear(&self) {
        *self.state.write() = SessionState::default();

        if let Some(store) = &self.store
            && let Err(e) = store.clear()
        {
            warn!(error = %e, "Failed to clear persisted session");
        }

        info!("Session cleared");
    }

    /// Writes the current facts to the store, if any.
    ///
    /// Persistence failures are logged; the in-memory session stays valid.
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let snapshot = {
            let state = self.state.read();
            PersistedSession::new(state.credential.as_ref(), state.last_known)
        };

        if let Err(e) = store.save(&snapshot) {
            warn!(error = %e, "Failed to persist session");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
