//! Session management module.
//!
//! This module provides the client session model, its status machine,
//! persistence of the `{ user, token }` blob, and the container that owns
//! the session and mediates login, logout and restore.

mod container;
mod model;
pub mod persist;
mod state;

pub use container::{LoginOutcome, ObserverId, PendingLogin, SessionContainer};
pub use model::{PersistedSession, Session, User, ADMIN_ROLE};
pub use persist::DEFAULT_STORAGE_KEY;
pub use state::SessionStatus;
