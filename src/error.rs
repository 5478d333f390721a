//! Error types for storefront-auth.

use thiserror::Error;

use crate::session::SessionStatus;

/// Main error type for storage and session bookkeeping.
///
/// The session container never returns this to `login`/`logout` callers;
/// it is surfaced by the lower layers (storage backends, the status machine)
/// that the container drives.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Storage key is not usable by the backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted blob could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid status transition attempted.
    #[error("invalid status transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for storefront-auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
