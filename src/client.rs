//! The authenticated HTTP client and its 401 recovery protocol.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth::RefreshResponse;
use crate::config::ApiConfig;
use crate::error::Error;
use crate::refresh::{RefreshFailure, RefreshGate, Ticket};
use crate::session::Session;

/// Buffered response from [`ApiClient::send`]. Always 2xx — error statuses
/// surface as [`Error::Http`] instead.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: u16,
    body: String,
}

impl ApiResponse {
    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Raw response body.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_str(&self.body).map_err(Error::from)
    }
}

struct ClientShared {
    http: reqwest::Client,
    config: ApiConfig,
    session: Session,
    gate: RefreshGate,
}

/// Authenticated HTTP client for the Lifeline REST API.
///
/// Attaches the current access token as a bearer header, and transparently
/// recovers from token expiry: concurrent 401s share a single call to the
/// refresh endpoint, queued requests resume in arrival order with the new
/// token, and each failed request is retried at most once. The refresh
/// credential is an HTTP-only cookie carried by the shared cookie store; the
/// client never reads or writes it.
///
/// Cloning is cheap; clones share the session, the cookie store, and the
/// refresh coordination.
#[derive(Clone)]
pub struct ApiClient {
    shared: Arc<ClientShared>,
}

impl ApiClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: ApiConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;

        Ok(Self::with_http_client(config, http))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The caller is responsible for enabling a cookie store if the refresh
    /// credential should survive across calls.
    #[must_use]
    pub fn with_http_client(config: ApiConfig, http: reqwest::Client) -> Self {
        Self {
            shared: Arc::new(ClientShared {
                http,
                config,
                session: Session::new(),
                gate: RefreshGate::default(),
            }),
        }
    }

    // ── Session ────────────────────────────────────────────────────

    /// Replace the current access token (e.g. after an out-of-band login).
    pub fn set_token(&self, token: impl Into<String>) {
        self.shared.session.set_token(token);
    }

    /// Drop the current access token. Requests keep flowing, unauthenticated.
    pub fn clear_token(&self) {
        self.shared.session.clear_token();
    }

    /// Whether an access token is currently held.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.shared.session.token().is_some()
    }

    /// Register the hook invoked when a refresh fails and the session is
    /// terminated. The application shell typically navigates to its login
    /// screen here. Fires once per failed refresh cycle, regardless of how
    /// many requests were waiting on it.
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.shared.session.set_expired_hook(Arc::new(hook));
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Issue a request with bearer attachment and 401 recovery.
    ///
    /// `path` starts with `/` and is joined to the configured base URL.
    /// A JSON `body` is replayed as-is if the request is retried.
    ///
    /// # Errors
    ///
    /// [`Error::Network`] when no response was received, [`Error::Http`] for
    /// any unrecovered non-2xx response, [`Error::Refresh`] when recovery was
    /// attempted and the refresh itself failed.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, Error> {
        let token = self.shared.session.token();
        let response = self.dispatch(&method, path, body, token).await?;

        // Only 401s are intercepted, and never for the refresh endpoint
        // itself — a rejected refresh must not trigger another refresh.
        if response.status().as_u16() != 401 || path == self.shared.config.refresh_path() {
            return Self::into_result(response).await;
        }

        tracing::debug!(path, "got 401, attempting token refresh");
        let token = self.refreshed_token().await?;
        let retried = self.dispatch(&method, path, body, Some(token)).await?;
        Self::into_result(retried).await
    }

    /// GET `path` and deserialize the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.send(Method::GET, path, None).await?.json()
    }

    /// POST `body` to `path` and deserialize the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(&body)).await?.json()
    }

    /// PUT `body` to `path` and deserialize the JSON response.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(&body)).await?.json()
    }

    /// DELETE `path`. Returns the raw response, since delete endpoints often
    /// answer with an empty body.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, Error> {
        self.send(Method::DELETE, path, None).await
    }

    // ── Internals ──────────────────────────────────────────────────

    /// One round-trip. Transport failures surface as [`Error::Network`].
    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        token: Option<String>,
    ) -> Result<reqwest::Response, Error> {
        let mut request = self
            .shared
            .http
            .request(method.clone(), self.shared.config.endpoint(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(Error::from)
    }

    /// Buffer the response; non-2xx becomes [`Error::Http`] with the raw body.
    async fn into_result(response: reqwest::Response) -> Result<ApiResponse, Error> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            Ok(ApiResponse {
                status: status.as_u16(),
                body,
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Obtain a fresh access token, coordinating with concurrent callers:
    /// the first one performs the refresh, everyone else queues for its
    /// outcome.
    async fn refreshed_token(&self) -> Result<String, Error> {
        match self.shared.gate.acquire() {
            Ticket::Waiter(rx) => match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(failure)) => Err(failure.into()),
                // The gate itself was dropped without settling.
                Err(_) => Err(Error::Refresh {
                    status: None,
                    detail: "refresh abandoned".into(),
                }),
            },
            Ticket::Leader => {
                let outcome = self.call_refresh_endpoint().await;
                // The new token must be visible before any waiter resumes.
                if let Ok(token) = &outcome {
                    self.shared.session.set_token(token.clone());
                }
                let waiters = self.shared.gate.settle(&outcome);
                match outcome {
                    Ok(token) => {
                        tracing::debug!(waiters, "access token refreshed");
                        Ok(token)
                    }
                    Err(failure) => {
                        tracing::warn!(
                            status = ?failure.status,
                            detail = %failure.detail,
                            waiters,
                            "token refresh failed, terminating session"
                        );
                        self.shared.session.expire();
                        Err(failure.into())
                    }
                }
            }
        }
    }

    /// One attempt against the refresh endpoint. Never intercepted, never
    /// retried. No bearer is attached: the refresh credential travels as an
    /// HTTP-only cookie.
    async fn call_refresh_endpoint(&self) -> Result<String, RefreshFailure> {
        let url = self
            .shared
            .config
            .endpoint(self.shared.config.refresh_path());
        let response = self
            .shared
            .http
            .post(url)
            .send()
            .await
            .map_err(|e| RefreshFailure {
                status: None,
                detail: format!("refresh request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RefreshFailure {
                status: Some(status.as_u16()),
                detail: if body.is_empty() {
                    "refresh rejected".into()
                } else {
                    body
                },
            });
        }

        let parsed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| RefreshFailure {
                status: Some(status.as_u16()),
                detail: format!("malformed refresh response: {e}"),
            })?;
        if parsed.access_token.is_empty() {
            return Err(RefreshFailure {
                status: Some(status.as_u16()),
                detail: "refresh response carried an empty access token".into(),
            });
        }
        Ok(parsed.access_token)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.shared.config.base_url())
            .field("session", &self.shared.session)
            .finish_non_exhaustive()
    }
}
