//! # storefront-auth
//!
//! Client session state for the storefront: who is signed in, with which
//! token, and how the last login attempt went.
//!
//! A [`SessionContainer`] owns the session. It runs logins through a
//! [`CredentialExchange`], persists `{ user, token }` to a
//! [`SessionStorage`] on success, restores it at startup, and clears it on
//! logout. Observers get every transition synchronously.
//!
//! ## Features
//!
//! - **Explicit status machine**: `idle`, `loading`, `succeeded`, `failed`
//! - **Validated exchange results**: malformed success bodies are errors,
//!   not half-empty sessions
//! - **Pluggable storage**: in-memory or one JSON file per key
//! - **Never throws**: login failures land in the session's `error`
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_auth::{DemoExchange, MemoryStorage, SessionContainer};
//!
//! #[tokio::main]
//! async fn main() {
//!     storefront_auth::logging::try_init().ok();
//!
//!     let container = SessionContainer::new(
//!         Arc::new(DemoExchange::new()),
//!         Arc::new(MemoryStorage::new()),
//!     );
//!
//!     container.observe(|session| println!("status is now {}", session.status));
//!
//!     let outcome = container.login("you@company.com", "secret").await;
//!     assert!(outcome.is_success());
//!
//!     container.logout();
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod exchange;
pub mod logging;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use error::{AuthError, Result};
pub use exchange::{
    AccountClient, CredentialExchange, Credentials, DemoExchange, ExchangeError, Grant,
    HttpExchange,
};
pub use session::{
    LoginOutcome, ObserverId, PendingLogin, PersistedSession, Session, SessionContainer,
    SessionStatus, User,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
