//! Session list of the signed-in user.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::backend::ChatBackend;
use crate::error::ChatResult;
use crate::ids::SessionId;

use super::lifetime::{Lifetime, Sequence};

/// How a completed load was treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response replaced local state.
    Applied,
    /// A newer load had been issued meanwhile; this response was discarded.
    Superseded,
}

/// Known sessions, in the order the backend returned them.
pub struct SessionStore {
    backend: Arc<dyn ChatBackend>,
    lifetime: Lifetime,
    sessions: RwLock<Vec<SessionId>>,
    sequence: Sequence,
    in_flight: AtomicUsize,
}

/// Keeps the loading flag raised for the duration of one load.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, lifetime: Lifetime) -> Self {
        Self {
            backend,
            lifetime,
            sessions: RwLock::new(Vec::new()),
            sequence: Sequence::default(),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Fetch the session list from the backend.
    ///
    /// Overlapping loads may complete in any order; only the response of the
    /// most recently issued load is applied. On failure the current list is
    /// kept.
    ///
    /// # Errors
    /// Returns [`ChatError::Network`](crate::error::ChatError::Network) if
    /// the backend call fails, or `Cancelled` after teardown.
    pub async fn load(&self) -> ChatResult<LoadOutcome> {
        let seq = self.sequence.issue();
        let _loading = LoadingGuard::enter(&self.in_flight);

        let sessions = match self.lifetime.guard(self.backend.list_sessions()).await {
            Ok(sessions) => sessions,
            Err(err) => {
                if !err.is_cancelled() {
                    tracing::warn!(seq, "failed to load sessions: {err}");
                }
                return Err(err);
            }
        };

        let mut current = self.sessions.write().await;
        if !self.sequence.is_latest(seq) {
            tracing::debug!(seq, "discarding stale session list");
            return Ok(LoadOutcome::Superseded);
        }

        tracing::debug!(seq, count = sessions.len(), "session list loaded");
        *current = sessions;
        Ok(LoadOutcome::Applied)
    }

    /// Snapshot of the known sessions.
    pub async fn sessions(&self) -> Vec<SessionId> {
        self.sessions.read().await.clone()
    }

    /// First session in display order.
    pub async fn first(&self) -> Option<SessionId> {
        self.sessions.read().await.first().cloned()
    }

    /// Whether `id` is in the list.
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains(id)
    }

    /// Number of known sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are known.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Whether at least one load is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Stop applying results of in-flight loads.
    pub fn shutdown(&self) {
        self.lifetime.end();
    }
}
