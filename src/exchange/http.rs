//! HTTP credential exchange.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CredentialExchange, Credentials, ExchangeError, Grant};

/// Message used when a refusal carries no usable `message`.
pub const LOGIN_FAILED: &str = "Login failed";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body sent to the authentication endpoint.
#[derive(Serialize)]
struct LoginRequest<'a> {
    action: &'static str,
    email: &'a str,
    password: &'a str,
}

/// Optional body of a refusal.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Posts credentials as JSON to an authentication endpoint.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpExchange {
    /// Create an exchange for `endpoint` with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ExchangeError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create an exchange for `endpoint` with a custom request timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, endpoint))
    }

    /// Create an exchange that reuses an existing client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Message carried by a refusal body, or `fallback`.
pub(crate) fn rejection_message(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl CredentialExchange for HttpExchange {
    async fn exchange(&self, credentials: &Credentials) -> Result<Grant, ExchangeError> {
        let request = LoginRequest {
            action: "login",
            email: &credentials.email,
            password: &credentials.password,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(%status, endpoint = %self.endpoint, "credentials rejected");
            return Err(ExchangeError::Rejected(rejection_message(
                &body,
                LOGIN_FAILED,
            )));
        }

        Grant::from_body(&body)
    }
}
