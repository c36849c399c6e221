//! Sign-in and the read-only credential context.
//!
//! A [`Credentials`] value is created once by [`AuthClient::sign_in`] and then
//! shared (behind an `Arc`) with every component that talks to the backend.
//! It is never mutated: signing out means dropping it together with the chat
//! screen that holds it, and signing in again yields a fresh one.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::http::{build_client, decode_json, send_checked};
use crate::backend::types::{HealthResponse, SignInRequest, SignInResponse};
use crate::config::ClientConfig;
use crate::error::{ChatError, ChatResult, ConfigError};

/// Path of the sign-in endpoint.
const SIGNIN_PATH: &str = "/signin";
/// Path of the health endpoint.
const HEALTH_PATH: &str = "/health";

/// Bearer token issued by the backend.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw token value, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Identity of the signed-in user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    user_id: String,
    token: AuthToken,
}

impl Credentials {
    /// Build credentials from an already-issued token.
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: AuthToken) -> Self {
        Self {
            user_id: user_id.into(),
            token,
        }
    }

    /// User identifier (the username the backend signed in).
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Bearer token.
    #[must_use]
    pub const fn token(&self) -> &AuthToken {
        &self.token
    }
}

/// Unauthenticated access to the backend: health and sign-in.
pub struct AuthClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl AuthClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    /// Exchange a username for credentials.
    ///
    /// # Errors
    /// Returns [`ChatError::InvalidInput`] for a blank username and
    /// [`ChatError::Network`] if the backend call fails.
    pub async fn sign_in(&self, username: &str) -> ChatResult<Credentials> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ChatError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }

        let body = SignInRequest {
            username: username.to_string(),
        };
        let request = self.client.post(self.config.endpoint(SIGNIN_PATH)).json(&body);
        let response = send_checked("POST", SIGNIN_PATH, request).await?;
        let signed: SignInResponse = decode_json(SIGNIN_PATH, response).await?;

        tracing::info!(user_id = %signed.user_id, "signed in");
        Ok(Credentials::new(signed.user_id, AuthToken::new(signed.token)))
    }

    /// Ask the backend whether it is up.
    ///
    /// # Errors
    /// Returns [`ChatError::Network`] if the backend cannot be reached.
    pub async fn health(&self) -> ChatResult<bool> {
        let request = self.client.get(self.config.endpoint(HEALTH_PATH));
        let response = send_checked("GET", HEALTH_PATH, request).await?;
        let health: HealthResponse = decode_json(HEALTH_PATH, response).await?;
        Ok(matches!(health.status.as_str(), "healthy" | "ok"))
    }
}
