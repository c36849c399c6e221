//! Wire types for the chat backend HTTP API.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;

/// Body of `POST /signin`.
#[derive(Clone, Debug, Serialize)]
pub struct SignInRequest {
    /// Username to sign in as.
    pub username: String,
}

/// Response of `POST /signin`.
#[derive(Clone, Debug, Deserialize)]
pub struct SignInResponse {
    /// Bearer token for subsequent calls.
    pub token: String,
    /// Identifier the backend assigned to the user.
    pub user_id: String,
}

/// Response of `GET /health`.
#[derive(Clone, Debug, Deserialize)]
pub struct HealthResponse {
    /// Reported status, `"healthy"` when all is well.
    pub status: String,
}

/// Response of `GET /chat/sessions`.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionListResponse {
    /// Session ids in server-defined display order.
    pub sessions: Vec<SessionId>,
}

/// One persisted message in `GET /chat/sessions/{id}/history`.
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryEntry {
    /// Author role (`user`, `assistant`, possibly others).
    pub role: String,
    /// Message text.
    pub content: String,
    /// ISO-8601 timestamp; may be absent.
    #[serde(default)]
    pub timestamp: String,
}

/// Response of `GET /chat/sessions/{id}/history`.
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryResponse {
    /// Messages in server order.
    pub messages: Vec<HistoryEntry>,
}

/// Body of `POST /chat`.
///
/// `session_id` is serialized as `null` when no session exists yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// User message text.
    pub message: String,
    /// Session to continue, or `None` to start one.
    pub session_id: Option<SessionId>,
}

/// Response of `POST /chat`.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatReply {
    /// Assistant reply text.
    pub response: String,
    /// Session the turn was recorded in.
    pub session_id: SessionId,
}
