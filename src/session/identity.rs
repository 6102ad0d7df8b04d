//! Credential, identity and role types.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::identifiers::UserId;

// ============================================================================
// Credential
// ============================================================================

/// Opaque bearer token issued by the authentication flow.
///
/// `Debug` output is redacted so the token never reaches logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token string.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for attaching to a request.
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl From<&str> for Credential {
    #[inline]
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    #[inline]
    fn from(token: String) -> Self {
        Self(token)
    }
}

// ============================================================================
// Role
// ============================================================================

/// Whether the subject drives or rides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Requests rides.
    Rider,
    /// Accepts and completes rides.
    Driver,
}

impl Role {
    /// Converts the wire `is_driver` flag.
    #[inline]
    #[must_use]
    pub const fn from_is_driver(is_driver: bool) -> Self {
        if is_driver { Self::Driver } else { Self::Rider }
    }

    /// Returns `true` for [`Role::Driver`].
    #[inline]
    #[must_use]
    pub const fn is_driver(self) -> bool {
        matches!(self, Self::Driver)
    }

    /// Infers the role from the status of a driver-only endpoint.
    ///
    /// `200` means the caller may use driver endpoints, `403` means it may
    /// not. Any other status says nothing. This is a heuristic for when no
    /// handshake identity is available; the handshake's role flag wins.
    #[must_use]
    pub const fn infer_from_status(status: u16) -> Option<Self> {
        match status {
            200 => Some(Self::Driver),
            403 => Some(Self::Rider),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rider => f.write_str("rider"),
            Self::Driver => f.write_str("driver"),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Subject and role learned from a handshake acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Authenticated subject.
    pub user_id: UserId,
    /// Subject's role.
    pub role: Role,
}

impl Identity {
    /// Creates an identity.
    #[inline]
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("eyJhbGciOi.secret");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
        assert_eq!(credential.expose(), "eyJhbGciOi.secret");
    }

    #[test]
    fn test_role_from_flag() {
        assert_eq!(Role::from_is_driver(true), Role::Driver);
        assert_eq!(Role::from_is_driver(false), Role::Rider);
        assert!(Role::Driver.is_driver());
    }

    #[test]
    fn test_role_inference_heuristic() {
        assert_eq!(Role::infer_from_status(200), Some(Role::Driver));
        assert_eq!(Role::infer_from_status(403), Some(Role::Rider));
        assert_eq!(Role::infer_from_status(401), None);
        assert_eq!(Role::infer_from_status(500), None);
    }
}
