use thiserror::Error;

/// Failures that abort a page fetch and move a feed into its error state.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not complete (DNS, connection, TLS, timeout, body read)
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with a non-2xx status code
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
    /// The body was not JSON, or lacked the expected fields
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network(format!("request timed out: {}", err))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(format!("invalid JSON: {}", err))
    }
}

/// A single field rejected during normalization.
///
/// Never fatal: the field falls back to null or a placeholder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("root-relative URL has no resolvable host: {0}")]
    RelativeUrl(String),
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("unparseable URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}
