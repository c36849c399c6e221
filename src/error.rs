//! Error types for the chat client.

use thiserror::Error;

/// Errors raised while building the client configuration.
///
/// These are fatal: they surface before any chat interaction is possible.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No backend address was supplied.
    #[error("backend API URL not configured (set JAMIE_API_URL or pass --api-url)")]
    MissingBaseUrl,

    /// The backend address could not be parsed.
    #[error("invalid backend API URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The backend address is not an http(s) URL.
    #[error("unsupported backend URL scheme: {0}")]
    UnsupportedScheme(String),

    /// A numeric setting is out of range.
    #[error("invalid configuration: {0}")]
    InvalidValue(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Errors produced by a single backend call.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{method} {path} returned status {status}")]
    Status {
        /// HTTP method of the failed call.
        method: &'static str,
        /// Request path of the failed call.
        path: String,
        /// Status code returned by the backend.
        status: u16,
    },

    /// The response body did not match the expected shape.
    #[error("unexpected response body from {path}: {message}")]
    Decode {
        /// Request path of the failed call.
        path: String,
        /// Decoder message.
        message: String,
    },

    /// The backend could not be reached for another reason.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl NetworkError {
    /// Check if this error is worth retrying by hand.
    ///
    /// Nothing in the client retries automatically.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Unavailable(_) => true,
            Self::Decode { .. } => false,
        }
    }
}

/// Top-level error for chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A backend call failed.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Input was rejected before reaching the backend.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The owning screen was torn down while the call was in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// Terminal I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(err) => err.is_retryable(),
            Self::Config(_) | Self::InvalidInput(_) | Self::Cancelled | Self::Io(_) => false,
        }
    }

    /// Whether this error came from a teardown rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience result alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;
