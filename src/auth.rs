//! Auth-session operations: login, logout, current user.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::error::Error;

/// Account described by the `/auth` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Whether the account carries an administrative role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.role.as_deref(), Some("admin") | Some("superadmin"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeResponse {
    pub user: User,
}

/// Success payload of the refresh endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub access_token: String,
}

impl ApiClient {
    /// Authenticate with email and password.
    ///
    /// On success the returned access token becomes the session token, and
    /// the server plants the refresh cookie in the shared cookie store.
    ///
    /// # Errors
    ///
    /// Surfaces the server's rejection ([`Error::Http`] or, after an
    /// exhausted recovery attempt, [`Error::Refresh`]) without storing
    /// anything.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, Error> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self.send(Method::POST, "/auth/login", Some(&body)).await?;
        let login: LoginResponse = response.json()?;
        self.set_token(login.access_token);
        tracing::debug!(user = %login.user.id, "logged in");
        Ok(login.user)
    }

    /// End the session server-side and locally.
    ///
    /// The local token is cleared even when the server call fails — the
    /// caller decided to log out, so the session is gone either way.
    ///
    /// # Errors
    ///
    /// Returns the server-side failure after the local clear.
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self.send(Method::POST, "/auth/logout", None).await;
        self.clear_token();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "logout request failed, session cleared locally");
        }
        result.map(|_| ())
    }

    /// Fetch the currently authenticated user.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] with status 401 when no session can be established.
    pub async fn me(&self) -> Result<User, Error> {
        let response = self.send(Method::GET, "/auth/me", None).await?;
        Ok(response.json::<MeResponse>()?.user)
    }
}
