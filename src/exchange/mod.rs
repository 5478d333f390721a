//! Credential exchange collaborator.
//!
//! The container hands `{ email, password }` to a [`CredentialExchange`] and
//! gets back either a [`Grant`] (user plus token) or an [`ExchangeError`].
//! Response bodies are validated here, at the boundary, so a success that
//! lacks the user or token never reaches the session as empty fields.
//!
//! ## Implementations
//!
//! - [`HttpExchange`]: `POST` to an authentication endpoint
//! - [`DemoExchange`]: accepts any credentials with a fixed admin identity
//!
//! [`AccountClient`] talks to the same backend once a session exists.

mod account;
mod demo;
mod http;

pub use account::{AccountClient, CHANGE_PASSWORD_PATH, NEW_USER_ROLE, USERS_PATH};
pub use demo::{DemoExchange, DEMO_TOKEN};
pub use http::{HttpExchange, DEFAULT_TIMEOUT, LOGIN_FAILED};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::User;

/// Email and password submitted by the login form.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A validated successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Grant {
    pub user: User,
    pub token: String,
}

impl Grant {
    pub fn new(user: User, token: impl Into<String>) -> Self {
        Self {
            user,
            token: token.into(),
        }
    }

    /// Parse and validate a success body.
    ///
    /// Every user field and a non-empty token are required.
    pub fn from_body(body: &[u8]) -> Result<Self, ExchangeError> {
        let grant: Grant = serde_json::from_slice(body)
            .map_err(|e| ExchangeError::MalformedResponse(e.to_string()))?;

        if grant.token.trim().is_empty() {
            return Err(ExchangeError::MalformedResponse("empty token".into()));
        }

        Ok(grant)
    }
}

/// Why a credential exchange did not produce a grant.
///
/// The display string is what the session records as its error message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// The call could not complete (connection refused, timeout, ...).
    #[error("{0}")]
    Transport(String),

    /// The service answered and refused the credentials.
    #[error("{0}")]
    Rejected(String),

    /// The service reported success with an unusable body.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ExchangeError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Transport(_) => "transport",
            ExchangeError::Rejected(_) => "rejected",
            ExchangeError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Trades credentials for a user and token.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self, credentials: &Credentials) -> Result<Grant, ExchangeError>;
}
