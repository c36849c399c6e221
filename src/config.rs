//! Configuration for the chat client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Environment variable holding the backend base URL.
pub const API_URL_ENV: &str = "JAMIE_API_URL";

/// Environment variable overriding the request timeout (seconds).
pub const TIMEOUT_ENV: &str = "JAMIE_TIMEOUT_SECS";

/// Configuration for talking to the chat backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.example.com`.
    pub base_url: Url,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl ClientConfig {
    /// Build a config for the given base URL with default timeouts.
    ///
    /// # Errors
    /// Returns an error if the URL is empty, unparsable, or not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        let base_url = Url::parse(trimmed)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(base_url.scheme().to_string()));
        }

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("jamie-client/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Read the configuration from the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingBaseUrl`] when `JAMIE_API_URL` is unset,
    /// or a parse error for malformed values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var(API_URL_ENV).map_err(|_| ConfigError::MissingBaseUrl)?;
        let mut config = Self::new(&base_url)?;

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("{TIMEOUT_ENV}={raw}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "connect_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve an API path (e.g. `/chat/sessions`) against the base URL.
    ///
    /// A base URL with a path prefix (`https://host/api`) keeps that prefix.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
