//! Chat backend access.
//!
//! The sync layer only sees the [`ChatBackend`] trait; [`HttpBackend`] is
//! the production implementation over the REST API.

pub mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::{ChatReply, ChatRequest, HistoryEntry};

use std::future::Future;
use std::pin::Pin;

use crate::error::NetworkError;
use crate::ids::SessionId;

/// Boxed future type for backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, NetworkError>;

/// Authenticated chat operations for one signed-in user.
pub trait ChatBackend: Send + Sync {
    /// List the user's sessions in display order.
    fn list_sessions(&self) -> BackendFuture<'_, BackendResult<Vec<SessionId>>>;

    /// Fetch the full message history of a session, in server order.
    fn fetch_history<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BackendFuture<'a, BackendResult<Vec<HistoryEntry>>>;

    /// Submit one user turn and wait for the assistant reply.
    fn send_message(&self, request: ChatRequest) -> BackendFuture<'_, BackendResult<ChatReply>>;

    /// Delete one session.
    fn delete_session<'a>(&'a self, session_id: &'a SessionId)
    -> BackendFuture<'a, BackendResult<()>>;

    /// Delete every session of the user.
    fn delete_all_sessions(&self) -> BackendFuture<'_, BackendResult<()>>;
}
