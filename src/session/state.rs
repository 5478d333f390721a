//! Session status machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the session stands in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No attempt made, or the session was logged out.
    #[default]
    Idle,
    /// A credential exchange is in flight.
    Loading,
    /// The last exchange (or an external set) produced a session.
    Succeeded,
    /// The last exchange failed.
    Failed,
}

impl SessionStatus {
    /// Check if transition to target status is valid.
    ///
    /// Valid transitions:
    /// - Idle | Succeeded | Failed -> Loading
    /// - Loading -> Succeeded
    /// - Loading -> Failed
    /// - any -> Idle
    pub fn can_transition_to(&self, target: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (*self, target),
            (Idle | Succeeded | Failed, Loading)
                | (Loading, Succeeded)
                | (Loading, Failed)
                | (_, Idle)
        )
    }

    /// Attempt to transition to a new status.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionStatus) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::AuthError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if a login attempt is in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionStatus::Loading)
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Succeeded => "succeeded",
            SessionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
