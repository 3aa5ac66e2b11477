//! Source adapter errors.

/// Result type for source adapter operations.
pub type SourceResult<T, E = SourceError> = std::result::Result<T, E>;

/// Errors raised while fetching from an upstream API.
///
/// Every variant is scoped to a single page: the coordinator logs it and
/// moves on to the next page.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request could not be sent or the body could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    /// The body was not the expected JSON shape.
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured base URL cannot be used to build request URLs.
    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The upstream answered with an error payload.
    #[error("upstream rejected the request: {0}")]
    Rejected(String),

    /// The adapter cannot serve this scope.
    #[error("scope '{scope}' is not supported: {reason}")]
    UnsupportedScope { scope: String, reason: String },
}

impl SourceError {
    /// Creates an unsupported scope error.
    pub fn unsupported_scope(scope: impl ToString, reason: impl Into<String>) -> Self {
        Self::UnsupportedScope {
            scope: scope.to_string(),
            reason: reason.into(),
        }
    }
}
