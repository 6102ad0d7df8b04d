//! Session persistence.
//!
//! The credential and last-known identity survive process restarts and
//! are removed on explicit logout.
//!
//! # File Format
//!
//! ```json
//! { "token": "<bearer>", "user_id": 42, "is_driver": true }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{from_slice, to_vec_pretty};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::UserId;

use super::identity::{Credential, Identity, Role};

// ============================================================================
// Constants
// ============================================================================

/// Directory name under the platform data directory.
const APP_DIR: &str = "ride-sync";

/// Session file name.
const SESSION_FILE: &str = "session.json";

// ============================================================================
// PersistedSession
// ============================================================================

/// Snapshot of the session facts kept across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Last confirmed subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    /// Last confirmed role flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_driver: Option<bool>,
}

impl PersistedSession {
    /// Builds a snapshot from live session facts.
    #[must_use]
    pub fn new(credential: Option<&Credential>, identity: Option<Identity>) -> Self {
        Self {
            token: credential.map(|c| c.expose().to_string()),
            user_id: identity.map(|i| i.user_id),
            is_driver: identity.map(|i| i.role.is_driver()),
        }
    }

    /// Returns the stored identity if both facts are present.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        match (self.user_id, self.is_driver) {
            (Some(user_id), Some(is_driver)) => {
                Some(Identity::new(user_id, Role::from_is_driver(is_driver)))
            }
            _ => None,
        }
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// Persistence backend for session facts.
pub trait SessionStore: Send + Sync {
    /// Loads the snapshot, `None` if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data exists but cannot be read.
    fn load(&self) -> Result<Option<PersistedSession>>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, session: &PersistedSession) -> Result<()>;

    /// Removes the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if existing data cannot be removed.
    fn clear(&self) -> Result<()>;
}

// ============================================================================
// FileSessionStore
// ============================================================================

/// JSON file session store.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    /// Path of the session file.
    path: PathBuf,
}

impl FileSessionStore {
    /// Creates a store writing to `path`.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the platform's local data directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the platform has no data directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| Error::config("No local data directory on this platform"))?;
        Ok(Self::new(base.join(APP_DIR).join(SESSION_FILE)))
    }

    /// Returns the session file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session = from_slice(&bytes)?;
        debug!(path = %self.path.display(), "Session file loaded");
        Ok(Some(session))
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Atomic replace
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, to_vec_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;

        trace!(path = %self.path.display(), "Session file written");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
