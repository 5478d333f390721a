//! Reading and writing the session blob.

use super::{PersistedSession, Session};
use crate::storage::SessionStorage;
use crate::Result;

/// Storage key the session is kept under.
pub const DEFAULT_STORAGE_KEY: &str = "auth";

/// Load the session stored under `key`.
///
/// Missing, unreadable or malformed blobs all yield the default session.
/// The stored token is trusted as-is.
pub fn load(storage: &dyn SessionStorage, key: &str) -> Session {
    let raw = match storage.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Session::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read persisted session");
            return Session::default();
        }
    };

    match serde_json::from_str::<PersistedSession>(&raw) {
        Ok(blob) => blob.into_session(),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring malformed persisted session");
            Session::default()
        }
    }
}

/// Write the `{ user, token }` blob for `session` under `key`.
pub fn save(storage: &dyn SessionStorage, key: &str, session: &Session) -> Result<()> {
    let blob = serde_json::to_string(&session.to_persisted())?;
    storage.set(key, &blob)
}

/// Remove the blob stored under `key`.
pub fn clear(storage: &dyn SessionStorage, key: &str) -> Result<()> {
    storage.remove(key)
}
