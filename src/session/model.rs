//! Session data model and its persisted form.

use serde::{Deserialize, Serialize};

use super::SessionStatus;

/// Role that unlocks the admin panel.
pub const ADMIN_ROLE: &str = "admin";

/// The signed-in user as reported by the credential exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub role: String,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: role.into(),
        }
    }

    /// Check if the user may open the admin panel.
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Current authentication state held by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    /// Signed-in user, if any.
    pub user: Option<User>,
    /// Opaque bearer token, if any.
    pub token: Option<String>,
    /// Login lifecycle status.
    pub status: SessionStatus,
    /// Message of the last failed attempt.
    pub error: Option<String>,
}

impl Session {
    /// A settled session for a known user and token.
    pub fn authenticated(user: User, token: impl Into<String>) -> Self {
        Self {
            user: Some(user),
            token: Some(token.into()),
            status: SessionStatus::Succeeded,
            error: None,
        }
    }

    /// Check if both a user and a token are present.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }

    /// The blob written to storage for this session.
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            user: self.user.clone(),
            token: self.token.clone(),
            status: None,
            error: None,
        }
    }
}

/// Serialized `{ user, token }` blob kept under the storage key.
///
/// `status` and `error` are accepted when reading blobs written by older
/// clients that stored the whole state, but are never written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, skip_serializing)]
    pub status: Option<SessionStatus>,
    #[serde(default, skip_serializing)]
    pub error: Option<String>,
}

impl PersistedSession {
    /// Rebuild a session from the stored blob.
    ///
    /// User and token are taken verbatim. A stored `loading` status is stale
    /// and collapses; a missing or collapsed status is derived from whether
    /// credentials are present. `succeeded` without credentials falls back
    /// to `idle`.
    pub fn into_session(self) -> Session {
        let has_credentials = self.user.is_some() && self.token.is_some();
        let derived = if has_credentials {
            SessionStatus::Succeeded
        } else {
            SessionStatus::Idle
        };

        let status = match self.status {
            None | Some(SessionStatus::Loading) => derived,
            Some(SessionStatus::Succeeded) if !has_credentials => SessionStatus::Idle,
            Some(status) => status,
        };

        let error = if status == SessionStatus::Failed {
            self.error
        } else {
            None
        };

        Session {
            user: self.user,
            token: self.token,
            status,
            error,
        }
    }
}
