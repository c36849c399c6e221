//! Transcript of the active session.
//!
//! The controller moves through `Empty → Loaded → (Sending → Loaded)*`:
//! history loads replace the transcript wholesale, sends append the user turn
//! optimistically and then the reply (or a canned failure notice).
//!
//! Every wholesale replacement bumps a generation counter. A send or history
//! load that completes after the transcript it started from was replaced is
//! dropped, so a late reply never lands in a different conversation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::backend::{ChatBackend, ChatRequest};
use crate::error::{ChatError, ChatResult};
use crate::ids::{MessageIdGenerator, SessionId};
use crate::message::{Message, Role};

use super::lifetime::{Lifetime, Sequence};
use super::session_store::LoadOutcome;

/// Why a send did not reach the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Nothing but whitespace to send.
    Empty,
    /// Another send is still waiting for its reply.
    InFlight,
}

/// Result of a successful send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// No-op; the transcript is unchanged.
    Ignored(IgnoreReason),
    /// The reply was appended.
    Replied {
        /// Session the backend recorded the turn in.
        session_id: SessionId,
        /// The backend assigned a session different from the tracked one.
        session_changed: bool,
    },
    /// The reply arrived after the transcript was replaced and was dropped.
    ///
    /// The backend still recorded the turn, so the session it names exists.
    Detached {
        /// Session the backend recorded the turn in.
        session_id: SessionId,
        /// The session differs from the one the send started from.
        session_changed: bool,
    },
}

impl SendOutcome {
    /// Whether the backend recorded the turn in a session other than the
    /// one the send started from, whether or not the reply was shown.
    #[must_use]
    pub const fn session_changed(&self) -> bool {
        match self {
            Self::Replied {
                session_changed, ..
            }
            | Self::Detached {
                session_changed, ..
            } => *session_changed,
            Self::Ignored(_) => false,
        }
    }
}

/// Result of clearing the active session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    /// No session was active; nothing was sent.
    NothingActive,
    /// The session was deleted on the backend.
    Deleted(SessionId),
}

#[derive(Debug, Default)]
struct TranscriptState {
    session_id: Option<SessionId>,
    messages: Vec<Message>,
    draft: String,
    generation: u64,
}

impl TranscriptState {
    fn replace(&mut self, session_id: Option<SessionId>, messages: Vec<Message>) {
        self.session_id = session_id;
        self.messages = messages;
        self.generation += 1;
    }
}

/// Raised while a send is in flight; lowered on drop, whatever the outcome.
struct SendingGuard<'a>(&'a AtomicBool);

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ordered messages of exactly one session (or of a fresh draft).
pub struct TranscriptController {
    backend: Arc<dyn ChatBackend>,
    lifetime: Lifetime,
    ids: MessageIdGenerator,
    state: RwLock<TranscriptState>,
    sending: AtomicBool,
    history_sequence: Sequence,
}

impl TranscriptController {
    /// Create an empty controller with no active session.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, lifetime: Lifetime) -> Self {
        Self {
            backend,
            lifetime,
            ids: MessageIdGenerator::new(),
            state: RwLock::new(TranscriptState::default()),
            sending: AtomicBool::new(false),
            history_sequence: Sequence::default(),
        }
    }

    /// Replace the transcript with the persisted history of `session_id`.
    ///
    /// Only the most recently requested history is applied. On failure the
    /// transcript and active session are left as they were.
    ///
    /// # Errors
    /// Returns [`ChatError::Network`] if the fetch fails, or `Cancelled`
    /// after teardown.
    pub async fn load_history(&self, session_id: SessionId) -> ChatResult<LoadOutcome> {
        let seq = self.history_sequence.issue();
        let generation = self.state.read().await.generation;

        let entries = match self
            .lifetime
            .guard(self.backend.fetch_history(&session_id))
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                if !err.is_cancelled() {
                    tracing::warn!(session_id = %session_id, "failed to load session history: {err}");
                }
                return Err(err);
            }
        };

        let messages: Vec<Message> = entries
            .into_iter()
            .filter_map(|entry| Message::from_history(&self.ids, entry))
            .collect();

        let mut state = self.state.write().await;
        if !self.history_sequence.is_latest(seq) || state.generation != generation {
            tracing::debug!(session_id = %session_id, "discarding superseded history");
            return Ok(LoadOutcome::Superseded);
        }

        tracing::debug!(session_id = %session_id, count = messages.len(), "history loaded");
        state.replace(Some(session_id), messages);
        Ok(LoadOutcome::Applied)
    }

    /// Send one user turn.
    ///
    /// The user message is appended before the backend is contacted. Blank
    /// input, or a call while another send is pending, is ignored.
    ///
    /// # Errors
    /// Returns [`ChatError::Network`] if the backend call fails; a canned
    /// assistant message has then been appended in place of the reply.
    /// Returns `Cancelled` after teardown.
    pub async fn send(&self, text: &str) -> ChatResult<SendOutcome> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(SendOutcome::Ignored(IgnoreReason::Empty));
        }
        let Some(_sending) = SendingGuard::acquire(&self.sending) else {
            tracing::debug!("send ignored: another send is in flight");
            return Ok(SendOutcome::Ignored(IgnoreReason::InFlight));
        };
        if self.lifetime.is_ended() {
            return Err(ChatError::Cancelled);
        }

        let (session_id, generation) = {
            let mut state = self.state.write().await;
            state
                .messages
                .push(Message::now(&self.ids, Role::User, content));
            state.draft.clear();
            (state.session_id.clone(), state.generation)
        };

        let request = ChatRequest {
            message: content.to_string(),
            session_id: session_id.clone(),
        };
        let result = self.lifetime.guard(self.backend.send_message(request)).await;

        match result {
            Ok(reply) => {
                let session_changed = session_id.as_ref() != Some(&reply.session_id);
                let mut state = self.state.write().await;
                if state.generation != generation {
                    tracing::debug!(session_id = %reply.session_id, "reply arrived for a replaced transcript");
                    return Ok(SendOutcome::Detached {
                        session_id: reply.session_id,
                        session_changed,
                    });
                }

                state
                    .messages
                    .push(Message::now(&self.ids, Role::Assistant, reply.response));

                if session_changed {
                    tracing::info!(session_id = %reply.session_id, "backend assigned session");
                    state.session_id = Some(reply.session_id.clone());
                }

                Ok(SendOutcome::Replied {
                    session_id: reply.session_id,
                    session_changed,
                })
            }
            Err(ChatError::Cancelled) => Err(ChatError::Cancelled),
            Err(err) => {
                tracing::warn!("failed to send message: {err}");
                let mut state = self.state.write().await;
                if state.generation == generation {
                    state.messages.push(Message::send_failed(&self.ids));
                }
                Err(err)
            }
        }
    }

    /// Send the current draft buffer.
    ///
    /// # Errors
    /// Same as [`TranscriptController::send`].
    pub async fn send_draft(&self) -> ChatResult<SendOutcome> {
        let draft = self.state.read().await.draft.clone();
        self.send(&draft).await
    }

    /// Replace the draft buffer.
    pub async fn set_draft(&self, text: impl Into<String>) {
        self.state.write().await.draft = text.into();
    }

    /// Current draft buffer.
    pub async fn draft(&self) -> String {
        self.state.read().await.draft.clone()
    }

    /// Start a fresh conversation locally; the next send creates a session.
    pub async fn start_new(&self) {
        self.state.write().await.replace(None, Vec::new());
    }

    /// Delete the active session on the backend, then reset locally.
    ///
    /// Local state is only cleared once the backend confirmed the delete.
    ///
    /// # Errors
    /// Returns [`ChatError::Network`] if the delete fails; the transcript and
    /// session id are then unchanged.
    pub async fn clear_active(&self) -> ChatResult<ClearOutcome> {
        let (session_id, generation) = {
            let state = self.state.read().await;
            match &state.session_id {
                Some(id) => (id.clone(), state.generation),
                None => return Ok(ClearOutcome::NothingActive),
            }
        };

        if let Err(err) = self
            .lifetime
            .guard(self.backend.delete_session(&session_id))
            .await
        {
            if !err.is_cancelled() {
                tracing::warn!(session_id = %session_id, "failed to clear session: {err}");
            }
            return Err(err);
        }

        let mut state = self.state.write().await;
        if state.generation == generation {
            state.replace(None, Vec::new());
        }
        tracing::info!(session_id = %session_id, "session cleared");
        Ok(ClearOutcome::Deleted(session_id))
    }

    /// Snapshot of the transcript.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }

    /// Number of messages in the transcript.
    pub async fn len(&self) -> usize {
        self.state.read().await.messages.len()
    }

    /// Whether the transcript is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.messages.is_empty()
    }

    /// Active session, `None` for a fresh draft.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.state.read().await.session_id.clone()
    }

    /// Whether a send is waiting for its reply.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Stop applying results of in-flight calls.
    pub fn shutdown(&self) {
        self.lifetime.end();
    }
}
