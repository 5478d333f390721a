//! Account operations on the storefront backend.
//!
//! These sit next to the credential exchange and use the signed-in
//! session's token: the admin user list, adding a user, and changing the
//! current user's password. Paths are resolved against the origin of the
//! authentication endpoint.

use std::time::Duration;

use reqwest::{Response, Url};
use serde::Serialize;

use super::http::rejection_message;
use super::{ExchangeError, DEFAULT_TIMEOUT};
use crate::session::User;

/// Path of the user list and user creation endpoint.
pub const USERS_PATH: &str = "/api/users";

/// Path of the change-password endpoint.
pub const CHANGE_PASSWORD_PATH: &str = "/api/change-password";

/// Role given to users created through [`AccountClient::add_user`].
pub const NEW_USER_ROLE: &str = "user";

const LIST_USERS_FAILED: &str = "Failed to load users";
const ADD_USER_FAILED: &str = "Error";
const CHANGE_PASSWORD_FAILED: &str = "Error changing password";

#[derive(Serialize)]
struct NewUserRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    role: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

/// Client for the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountClient {
    client: reqwest::Client,
    users: Url,
    change_password: Url,
}

impl AccountClient {
    /// Create a client for the origin of `base` with the default timeout.
    pub fn new(base: &str) -> Result<Self, ExchangeError> {
        Self::with_timeout(base, DEFAULT_TIMEOUT)
    }

    /// Create a client for the origin of `base` with a custom timeout.
    pub fn with_timeout(base: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        Self::with_client(client, base)
    }

    /// Create a client that reuses an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client, base: &str) -> Result<Self, ExchangeError> {
        let resolve = |path: &str| {
            Url::parse(base)
                .and_then(|url| url.join(path))
                .map_err(|e| ExchangeError::Transport(format!("invalid URL '{base}': {e}")))
        };

        Ok(Self {
            users: resolve(USERS_PATH)?,
            change_password: resolve(CHANGE_PASSWORD_PATH)?,
            client,
        })
    }

    pub fn users_url(&self) -> &Url {
        &self.users
    }

    pub fn change_password_url(&self) -> &Url {
        &self.change_password
    }

    /// Fetch every user known to the backend.
    pub async fn list_users(&self, token: &str) -> Result<Vec<User>, ExchangeError> {
        let response = self
            .client
            .get(self.users.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        let body = success_body(response, LIST_USERS_FAILED).await?;
        serde_json::from_slice(&body).map_err(|e| ExchangeError::MalformedResponse(e.to_string()))
    }

    /// Create a user with the `user` role.
    pub async fn add_user(
        &self,
        token: &str,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ExchangeError> {
        let request = NewUserRequest {
            name,
            email,
            password,
            role: NEW_USER_ROLE,
        };

        let response = self
            .client
            .post(self.users.clone())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        success_body(response, ADD_USER_FAILED).await?;
        tracing::debug!(email, "user added");
        Ok(())
    }

    /// Change the signed-in user's password.
    ///
    /// A refusal always reads "Error changing password"; the backend's
    /// message is only logged.
    pub async fn change_password(
        &self,
        token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ExchangeError> {
        let request = ChangePasswordRequest {
            old_password,
            new_password,
        };

        let response = self
            .client
            .post(self.change_password.clone())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        match success_body(response, CHANGE_PASSWORD_FAILED).await {
            Ok(_) => Ok(()),
            Err(ExchangeError::Rejected(message)) => {
                tracing::debug!(%message, "password change refused");
                Err(ExchangeError::Rejected(CHANGE_PASSWORD_FAILED.into()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Read the body of a 2xx response, or turn anything else into a refusal.
async fn success_body(response: Response, fallback: &str) -> Result<Vec<u8>, ExchangeError> {
    let status = response.status();
    let url = response.url().clone();
    let body = response
        .bytes()
        .await
        .map_err(|e| ExchangeError::Transport(e.to_string()))?;

    if !status.is_success() {
        tracing::debug!(%status, %url, "account request refused");
        return Err(ExchangeError::Rejected(rejection_message(&body, fallback)));
    }

    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_resolve_against_origin() {
        let client = AccountClient::new("http://127.0.0.1:3000/api/auth").unwrap();
        assert_eq!(
            client.users_url().as_str(),
            "http://127.0.0.1:3000/api/users"
        );
        assert_eq!(
            client.change_password_url().as_str(),
            "http://127.0.0.1:3000/api/change-password"
        );
    }

    #[test]
    fn test_invalid_base() {
        let err = AccountClient::new("not a url").unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[test]
    fn test_new_user_request_shape() {
        let json = serde_json::to_value(NewUserRequest {
            name: "Jane",
            email: "jane@shop.com",
            password: "pw",
            role: NEW_USER_ROLE,
        })
        .unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "Jane",
                "email": "jane@shop.com",
                "password": "pw",
                "role": "user"
            })
        );
    }

    #[test]
    fn test_change_password_request_shape() {
        let json = serde_json::to_value(ChangePasswordRequest {
            old_password: "old",
            new_password: "new",
        })
        .unwrap();

        assert_eq!(json["oldPassword"], "old");
        assert_eq!(json["newPassword"], "new");
    }
}
