use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Matches the timeout the platform's web client uses.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_REFRESH_PATH: &str = "/auth/refresh-token";

/// Lifeline API client configuration.
///
/// The required field (`base_url`) is a constructor parameter — no runtime
/// "missing field" errors.
///
/// ```rust,ignore
/// use lifeline_client::ApiConfig;
///
/// let config = ApiConfig::new("https://api.lifeline.example/api".parse()?);
/// // Optional overrides via chaining:
/// let config = config.with_timeout(std::time::Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) refresh_path: String,
}

impl ApiConfig {
    /// Create a configuration for the given API base URL.
    ///
    /// A trailing slash on the base URL is normalized away so paths always
    /// join as `{base}{path}`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            refresh_path: DEFAULT_REFRESH_PATH.into(),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// # Required env vars
    /// - `LIFELINE_API_URL`: API base URL
    ///
    /// # Optional env vars
    /// - `LIFELINE_API_TIMEOUT_SECS`: per-request timeout in seconds
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required vars are missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, Error> {
        let base = std::env::var("LIFELINE_API_URL")
            .map_err(|_| Error::Config("LIFELINE_API_URL is required".into()))?;
        let base_url: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("LIFELINE_API_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Ok(secs) = std::env::var("LIFELINE_API_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| Error::Config(format!("LIFELINE_API_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Override the per-request timeout (default 10 seconds).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the refresh endpoint path (default `/auth/refresh-token`).
    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// API base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Path of the token refresh endpoint.
    #[must_use]
    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    /// Absolute URL for an API path (paths start with `/`).
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}
