//! Placeholder exchange used by the storefront before a real auth backend.

use async_trait::async_trait;

use super::{CredentialExchange, Credentials, ExchangeError, Grant};
use crate::session::{User, ADMIN_ROLE};

/// Token handed out by [`DemoExchange`].
pub const DEMO_TOKEN: &str = "fake-jwt-token";

/// Display name of the demo identity.
const DEMO_NAME: &str = "Admin User";

/// Accepts any credentials and signs in as an admin with the given email.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoExchange;

impl DemoExchange {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialExchange for DemoExchange {
    async fn exchange(&self, credentials: &Credentials) -> Result<Grant, ExchangeError> {
        tracing::debug!(email = %credentials.email, "demo exchange accepting credentials");
        Ok(Grant::new(
            User::new(DEMO_NAME, credentials.email.clone(), ADMIN_ROLE),
            DEMO_TOKEN,
        ))
    }
}
