/// Errors returned by [`ApiClient`](crate::ApiClient) operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No response was received: connection failure, DNS error, or timeout.
    /// Never retried by the client.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server responded with a non-success status that was not (or could
    /// not be) recovered. The body is carried raw for the caller to render.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The refresh call itself failed: non-2xx, transport error, or a payload
    /// missing the token field. Delivered to every caller waiting on that
    /// refresh cycle, so it carries plain data rather than a source error.
    #[error("token refresh failed: {detail}")]
    Refresh {
        status: Option<u16>,
        detail: String,
    },

    /// A body could not be serialized or deserialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration or environment.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status associated with the error, when a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Refresh { status, .. } => *status,
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error means the session could not be recovered.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Refresh { .. })
    }
}
