//! Chat screen state: session list plus active transcript.
//!
//! [`ChatScreen`] wires a [`SessionStore`] and a [`TranscriptController`] to
//! one backend and one credential context, and implements the interactions
//! that involve both (mount, send-then-refresh, clear-then-refresh).

pub mod lifetime;
pub mod session_store;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use lifetime::Lifetime;
pub use session_store::{LoadOutcome, SessionStore};
pub use transcript::{ClearOutcome, IgnoreReason, SendOutcome, TranscriptController};

use std::sync::Arc;

use crate::auth::Credentials;
use crate::backend::{ChatBackend, HttpBackend};
use crate::config::ClientConfig;
use crate::error::{ChatResult, ConfigError};
use crate::ids::SessionId;

/// State behind the chat screen of one signed-in user.
///
/// Dropping the screen (sign-out) ends its lifetime: calls still in flight
/// complete into nothing.
pub struct ChatScreen {
    credentials: Arc<Credentials>,
    backend: Arc<dyn ChatBackend>,
    lifetime: Lifetime,
    sessions: SessionStore,
    transcript: TranscriptController,
}

impl ChatScreen {
    /// Build a screen over an existing backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, credentials: Arc<Credentials>) -> Self {
        let lifetime = Lifetime::new();
        Self {
            sessions: SessionStore::new(backend.clone(), lifetime.child()),
            transcript: TranscriptController::new(backend.clone(), lifetime.child()),
            credentials,
            backend,
            lifetime,
        }
    }

    /// Build a screen talking to the configured HTTP backend.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn connect(config: ClientConfig, credentials: Arc<Credentials>) -> Result<Self, ConfigError> {
        let backend = HttpBackend::new(config, credentials.clone())?;
        Ok(Self::new(Arc::new(backend), credentials))
    }

    /// Initial load: fetch sessions and open the first one if none is active.
    ///
    /// Returns the session that was opened, if any.
    ///
    /// # Errors
    /// Returns the error of the session-list or history load.
    pub async fn mount(&self) -> ChatResult<Option<SessionId>> {
        self.sessions.load().await?;

        if self.transcript.session_id().await.is_some() {
            return Ok(None);
        }
        let Some(first) = self.sessions.first().await else {
            return Ok(None);
        };

        tracing::debug!(session_id = %first, "opening most recent session");
        self.transcript.load_history(first.clone()).await?;
        Ok(Some(first))
    }

    /// Reload the session list.
    ///
    /// # Errors
    /// Returns the load error; the previous list is kept.
    pub async fn refresh_sessions(&self) -> ChatResult<LoadOutcome> {
        self.sessions.load().await
    }

    /// Open a session and replace the transcript with its history.
    ///
    /// # Errors
    /// Returns the load error; the previous transcript is kept.
    pub async fn select_session(&self, session_id: SessionId) -> ChatResult<LoadOutcome> {
        self.transcript.load_history(session_id).await
    }

    /// Send a message; refresh the session list when a session was created.
    ///
    /// The refresh also happens when the reply was dropped because the
    /// transcript moved on: the backend created the session regardless.
    /// A failed refresh is logged and does not fail the send.
    ///
    /// # Errors
    /// Same as [`TranscriptController::send`].
    pub async fn send(&self, text: &str) -> ChatResult<SendOutcome> {
        let outcome = self.transcript.send(text).await?;
        if outcome.session_changed() {
            self.refresh_after_change().await;
        }
        Ok(outcome)
    }

    /// Start a new conversation locally.
    pub async fn start_new(&self) {
        self.transcript.start_new().await;
    }

    /// Delete the active session, then refresh the session list.
    ///
    /// # Errors
    /// Same as [`TranscriptController::clear_active`].
    pub async fn clear_active(&self) -> ChatResult<ClearOutcome> {
        let outcome = self.transcript.clear_active().await?;
        if matches!(outcome, ClearOutcome::Deleted(_)) {
            self.refresh_after_change().await;
        }
        Ok(outcome)
    }

    /// Delete every session of the user, reset the transcript, refresh.
    ///
    /// # Errors
    /// Returns the delete error; local state is then unchanged.
    pub async fn clear_all(&self) -> ChatResult<()> {
        if let Err(err) = self
            .lifetime
            .guard(self.backend.delete_all_sessions())
            .await
        {
            if !err.is_cancelled() {
                tracing::warn!("failed to clear all sessions: {err}");
            }
            return Err(err);
        }

        tracing::info!(user_id = %self.credentials.user_id(), "all sessions cleared");
        self.transcript.start_new().await;
        self.refresh_after_change().await;
        Ok(())
    }

    /// End the screen's lifetime; pending completions become no-ops.
    pub fn shutdown(&self) {
        self.lifetime.end();
    }

    /// Session list.
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Active transcript.
    #[must_use]
    pub const fn transcript(&self) -> &TranscriptController {
        &self.transcript
    }

    /// Signed-in user.
    #[must_use]
    pub fn username(&self) -> &str {
        self.credentials.user_id()
    }

    async fn refresh_after_change(&self) {
        if let Err(err) = self.sessions.load().await {
            tracing::debug!("session refresh after change failed: {err}");
        }
    }
}

impl Drop for ChatScreen {
    fn drop(&mut self) {
        self.lifetime.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthToken;
    use crate::backend::ChatReply;
    use crate::chat::testing::{Call, Gate, ScriptedBackend, entry, sid, unavailable};
    use crate::error::ChatError;

    fn screen(backend: &Arc<ScriptedBackend>) -> ChatScreen {
        let credentials = Arc::new(Credentials::new("alice", AuthToken::new("t0ken")));
        ChatScreen::new(backend.clone(), credentials)
    }

    #[tokio::test]
    async fn mount_opens_first_session() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1", "s2"]);
        backend.set_history("s1", vec![entry("user", "hi"), entry("assistant", "hello")]);
        let screen = screen(&backend);

        let opened = screen.mount().await.expect("mount succeeds");

        assert_eq!(opened, Some(sid("s1")));
        assert_eq!(
            backend.calls(),
            vec![Call::ListSessions, Call::FetchHistory(sid("s1"))]
        );
        assert_eq!(screen.transcript().session_id().await, Some(sid("s1")));
        assert_eq!(screen.transcript().len().await, 2);
    }

    #[tokio::test]
    async fn mount_with_no_sessions_stays_on_draft() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&[]);
        let screen = screen(&backend);

        assert_eq!(screen.mount().await.ok(), Some(None));
        assert_eq!(backend.calls(), vec![Call::ListSessions]);
        assert_eq!(screen.transcript().session_id().await, None);
    }

    #[tokio::test]
    async fn mount_failure_leaves_state_empty() {
        let backend = ScriptedBackend::new();
        backend.push_session_result(None, Err(unavailable()));
        let screen = screen(&backend);

        assert!(matches!(screen.mount().await, Err(ChatError::Network(_))));
        assert!(screen.sessions().is_empty().await);
        assert!(!screen.sessions().is_loading());
    }

    #[tokio::test]
    async fn new_conversation_refreshes_sidebar() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&[]);
        backend.push_reply("Here are options...", "new-42");
        backend.push_sessions(&["new-42"]);
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        let outcome = screen.send("Find me pizza").await.expect("send succeeds");

        assert!(matches!(
            outcome,
            SendOutcome::Replied {
                session_changed: true,
                ..
            }
        ));
        assert_eq!(screen.transcript().len().await, 2);
        assert_eq!(screen.transcript().session_id().await, Some(sid("new-42")));
        assert_eq!(screen.sessions().sessions().await, vec![sid("new-42")]);
        assert_eq!(backend.count(|c| *c == Call::ListSessions), 2);
    }

    #[tokio::test]
    async fn session_created_behind_new_chat_still_listed() {
        let backend = ScriptedBackend::new();
        let gate = Gate::new();
        backend.push_sessions(&[]);
        backend.push_reply_result(
            Some(gate.clone()),
            Ok(ChatReply {
                response: "late".to_string(),
                session_id: sid("new-7"),
            }),
        );
        backend.push_sessions(&["new-7"]);
        let screen = Arc::new(screen(&backend));
        screen.mount().await.expect("mount succeeds");

        let task = tokio::spawn({
            let screen = screen.clone();
            async move { screen.send("hello").await }
        });
        gate.entered().await;
        screen.start_new().await;
        gate.release();

        let outcome = task.await.expect("task joins").expect("send succeeds");
        assert!(matches!(outcome, SendOutcome::Detached { .. }));
        assert_eq!(backend.count(|c| *c == Call::ListSessions), 2);
        assert_eq!(screen.sessions().sessions().await, vec![sid("new-7")]);
        assert!(screen.transcript().is_empty().await);
        assert_eq!(screen.transcript().session_id().await, None);
    }

    #[tokio::test]
    async fn continuing_a_session_does_not_refresh() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1"]);
        backend.set_history("s1", vec![entry("user", "hi")]);
        backend.push_reply("ok", "s1");
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        screen.send("again").await.expect("send succeeds");

        assert_eq!(backend.count(|c| *c == Call::ListSessions), 1);
    }

    #[tokio::test]
    async fn failed_send_grows_transcript_by_two() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1"]);
        backend.set_history("s1", vec![entry("user", "hi"), entry("assistant", "hey")]);
        backend.push_reply_result(None, Err(unavailable()));
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        let result = screen.send("are you there?").await;

        assert!(matches!(result, Err(ChatError::Network(_))));
        assert_eq!(screen.transcript().len().await, 4);
        assert_eq!(screen.transcript().session_id().await, Some(sid("s1")));
        assert_eq!(backend.count(|c| *c == Call::ListSessions), 1);
    }

    #[tokio::test]
    async fn clear_active_refreshes_after_delete() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1", "s2"]);
        backend.set_history("s1", vec![entry("user", "hi")]);
        backend.push_sessions(&["s2"]);
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        let outcome = screen.clear_active().await.expect("clear succeeds");

        assert_eq!(outcome, ClearOutcome::Deleted(sid("s1")));
        assert_eq!(screen.sessions().sessions().await, vec![sid("s2")]);
        assert_eq!(screen.transcript().session_id().await, None);
    }

    #[tokio::test]
    async fn failed_clear_does_not_refresh() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1"]);
        backend.set_history("s1", vec![entry("user", "hi")]);
        backend.fail_deletes();
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        assert!(screen.clear_active().await.is_err());
        assert_eq!(backend.count(|c| *c == Call::ListSessions), 1);
        assert_eq!(screen.transcript().session_id().await, Some(sid("s1")));
        assert_eq!(screen.transcript().len().await, 1);
    }

    #[tokio::test]
    async fn clear_all_resets_everything() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1", "s2"]);
        backend.set_history("s1", vec![entry("user", "hi")]);
        backend.push_sessions(&[]);
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        screen.clear_all().await.expect("clear all succeeds");

        assert!(backend.calls().contains(&Call::DeleteAll));
        assert!(screen.sessions().is_empty().await);
        assert!(screen.transcript().is_empty().await);
        assert_eq!(screen.transcript().session_id().await, None);
    }

    #[tokio::test]
    async fn select_switches_transcript() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1", "s2"]);
        backend.set_history("s1", vec![entry("user", "one")]);
        backend.set_history("s2", vec![entry("user", "two"), entry("assistant", "2")]);
        let screen = screen(&backend);
        screen.mount().await.expect("mount succeeds");

        screen.select_session(sid("s2")).await.expect("select succeeds");

        assert_eq!(screen.transcript().session_id().await, Some(sid("s2")));
        assert_eq!(screen.transcript().len().await, 2);
    }

    #[tokio::test]
    async fn shutdown_cancels_later_calls() {
        let backend = ScriptedBackend::new();
        backend.push_sessions(&["s1"]);
        let screen = screen(&backend);

        screen.shutdown();

        assert!(matches!(screen.refresh_sessions().await, Err(ChatError::Cancelled)));
        assert!(screen.sessions().is_empty().await);
        assert_eq!(screen.username(), "alice");
    }
}
