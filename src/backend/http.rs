//! REST implementation of [`ChatBackend`] using `reqwest`.

use std::sync::Arc;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::auth::Credentials;
use crate::config::ClientConfig;
use crate::error::{ConfigError, NetworkError};
use crate::ids::{RequestId, SessionId};

use super::types::{ChatReply, ChatRequest, HistoryEntry, HistoryResponse, SessionListResponse};
use super::{BackendFuture, BackendResult, ChatBackend};

/// Path of the session collection.
const SESSIONS_PATH: &str = "/chat/sessions";
/// Path of the chat endpoint.
const CHAT_PATH: &str = "/chat";

/// Chat backend reached over HTTP with a bearer token.
pub struct HttpBackend {
    config: ClientConfig,
    credentials: Arc<Credentials>,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend for the signed-in user described by `credentials`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig, credentials: Arc<Credentials>) -> Result<Self, ConfigError> {
        let client = build_client(&config)?;
        Ok(Self {
            config,
            credentials,
            client,
        })
    }

    /// Credentials this backend authenticates with.
    #[must_use]
    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let request = self.client.get(self.config.endpoint(path));
        let response = self.execute("GET", path, request).await?;
        decode_json(path, response).await
    }

    async fn delete(&self, path: &str) -> BackendResult<()> {
        let request = self.client.delete(self.config.endpoint(path));
        self.execute("DELETE", path, request).await?;
        Ok(())
    }

    async fn execute(
        &self,
        method: &'static str,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> BackendResult<reqwest::Response> {
        let request = request.bearer_auth(self.credentials.token().expose());
        send_checked(method, path, request).await
    }
}

impl ChatBackend for HttpBackend {
    fn list_sessions(&self) -> BackendFuture<'_, BackendResult<Vec<SessionId>>> {
        Box::pin(async move {
            let body: SessionListResponse = self.get_json(SESSIONS_PATH).await?;
            Ok(body.sessions)
        })
    }

    fn fetch_history<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BackendFuture<'a, BackendResult<Vec<HistoryEntry>>> {
        Box::pin(async move {
            let path = format!("{}/history", session_path(session_id));
            let body: HistoryResponse = self.get_json(&path).await?;
            Ok(body.messages)
        })
    }

    fn send_message(&self, request: ChatRequest) -> BackendFuture<'_, BackendResult<ChatReply>> {
        Box::pin(async move {
            let builder = self.client.post(self.config.endpoint(CHAT_PATH)).json(&request);
            let response = self.execute("POST", CHAT_PATH, builder).await?;
            decode_json(CHAT_PATH, response).await
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BackendFuture<'a, BackendResult<()>> {
        Box::pin(async move { self.delete(&session_path(session_id)).await })
    }

    fn delete_all_sessions(&self) -> BackendFuture<'_, BackendResult<()>> {
        Box::pin(async move { self.delete(SESSIONS_PATH).await })
    }
}

/// Path of one session, with the id percent-encoded as a single segment.
fn session_path(session_id: &SessionId) -> String {
    format!(
        "{SESSIONS_PATH}/{}",
        urlencoding::encode(session_id.as_str())
    )
}

/// Build an HTTP client with the configured timeouts and headers.
pub(crate) fn build_client(config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
    let mut headers = HeaderMap::new();

    if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
        headers.insert(USER_AGENT, ua);
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .gzip(true)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Send a request and turn non-success statuses into [`NetworkError::Status`].
pub(crate) async fn send_checked(
    method: &'static str,
    path: &str,
    request: reqwest::RequestBuilder,
) -> BackendResult<reqwest::Response> {
    let request_id = RequestId::new();
    tracing::debug!(%request_id, method, path, "backend request");

    let response = request.send().await.map_err(|e| {
        tracing::warn!(%request_id, method, path, "backend request failed: {e}");
        NetworkError::from(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%request_id, method, path, status = status.as_u16(), "backend returned error status");
        return Err(NetworkError::Status {
            method,
            path: path.to_string(),
            status: status.as_u16(),
        });
    }

    tracing::debug!(%request_id, status = status.as_u16(), "backend response");
    Ok(response)
}

/// Read and decode a JSON response body.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> BackendResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| NetworkError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_path_encodes_id() {
        let id = SessionId::new("a b/c").expect("non-empty id");
        assert_eq!(session_path(&id), "/chat/sessions/a%20b%2Fc");
    }

    #[test]
    fn session_path_plain_id() {
        let id = SessionId::new("s1").expect("non-empty id");
        assert_eq!(session_path(&id), "/chat/sessions/s1");
    }

    #[test]
    fn client_builds_from_config() {
        let config = ClientConfig::new("http://localhost:8000").expect("valid url");
        assert!(build_client(&config).is_ok());
    }
}
