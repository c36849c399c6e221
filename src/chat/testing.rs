//! Scripted in-memory backend for the chat component tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::backend::{
    BackendFuture, BackendResult, ChatBackend, ChatReply, ChatRequest, HistoryEntry,
};
use crate::error::NetworkError;
use crate::ids::SessionId;

/// Holds a backend call open until the test releases it.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until a call has reached the gate.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call complete.
    pub(crate) fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// A backend call as observed by the scripted backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ListSessions,
    FetchHistory(SessionId),
    Send(ChatRequest),
    Delete(SessionId),
    DeleteAll,
}

struct Scripted<T> {
    gate: Option<Arc<Gate>>,
    result: BackendResult<T>,
}

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    calls: Mutex<Vec<Call>>,
    session_lists: Mutex<VecDeque<Scripted<Vec<SessionId>>>>,
    histories: Mutex<HashMap<SessionId, Vec<HistoryEntry>>>,
    failing_histories: Mutex<HashSet<SessionId>>,
    history_gate: Mutex<Option<Arc<Gate>>>,
    replies: Mutex<VecDeque<Scripted<ChatReply>>>,
    fail_deletes: Mutex<bool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) fn sid(raw: &str) -> SessionId {
    SessionId::new(raw).expect("test session ids are non-empty")
}

pub(crate) fn entry(role: &str, content: &str) -> HistoryEntry {
    HistoryEntry {
        role: role.to_string(),
        content: content.to_string(),
        timestamp: "2024-05-01T12:00:00Z".to_string(),
    }
}

pub(crate) fn unavailable() -> NetworkError {
    NetworkError::Unavailable("connection refused".to_string())
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_sessions(&self, ids: &[&str]) {
        self.push_session_result(None, Ok(ids.iter().map(|id| sid(id)).collect()));
    }

    pub(crate) fn push_session_result(
        &self,
        gate: Option<Arc<Gate>>,
        result: BackendResult<Vec<SessionId>>,
    ) {
        lock(&self.session_lists).push_back(Scripted { gate, result });
    }

    pub(crate) fn set_history(&self, id: &str, entries: Vec<HistoryEntry>) {
        lock(&self.histories).insert(sid(id), entries);
    }

    pub(crate) fn fail_history(&self, id: &str) {
        lock(&self.failing_histories).insert(sid(id));
    }

    pub(crate) fn gate_next_history(&self, gate: Arc<Gate>) {
        *lock(&self.history_gate) = Some(gate);
    }

    pub(crate) fn push_reply(&self, response: &str, session_id: &str) {
        self.push_reply_result(
            None,
            Ok(ChatReply {
                response: response.to_string(),
                session_id: sid(session_id),
            }),
        );
    }

    pub(crate) fn push_reply_result(&self, gate: Option<Arc<Gate>>, result: BackendResult<ChatReply>) {
        lock(&self.replies).push_back(Scripted { gate, result });
    }

    pub(crate) fn fail_deletes(&self) {
        *lock(&self.fail_deletes) = true;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        lock(&self.calls).push(call);
    }
}

async fn play<T>(scripted: Option<Scripted<T>>, fallback: impl FnOnce() -> BackendResult<T>) -> BackendResult<T> {
    match scripted {
        Some(Scripted { gate, result }) => {
            if let Some(gate) = gate {
                gate.pass().await;
            }
            result
        }
        None => fallback(),
    }
}

impl ChatBackend for ScriptedBackend {
    fn list_sessions(&self) -> BackendFuture<'_, BackendResult<Vec<SessionId>>> {
        Box::pin(async move {
            self.record(Call::ListSessions);
            let next = lock(&self.session_lists).pop_front();
            play(next, || Ok(Vec::new())).await
        })
    }

    fn fetch_history<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BackendFuture<'a, BackendResult<Vec<HistoryEntry>>> {
        Box::pin(async move {
            self.record(Call::FetchHistory(session_id.clone()));
            let gate = lock(&self.history_gate).take();
            if let Some(gate) = gate {
                gate.pass().await;
            }
            if lock(&self.failing_histories).contains(session_id) {
                return Err(unavailable());
            }
            Ok(lock(&self.histories)
                .get(session_id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn send_message(&self, request: ChatRequest) -> BackendFuture<'_, BackendResult<ChatReply>> {
        Box::pin(async move {
            self.record(Call::Send(request));
            let next = lock(&self.replies).pop_front();
            play(next, || Err(unavailable())).await
        })
    }

    fn delete_session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BackendFuture<'a, BackendResult<()>> {
        Box::pin(async move {
            self.record(Call::Delete(session_id.clone()));
            if *lock(&self.fail_deletes) {
                return Err(unavailable());
            }
            lock(&self.histories).remove(session_id);
            Ok(())
        })
    }

    fn delete_all_sessions(&self) -> BackendFuture<'_, BackendResult<()>> {
        Box::pin(async move {
            self.record(Call::DeleteAll);
            if *lock(&self.fail_deletes) {
                return Err(unavailable());
            }
            lock(&self.histories).clear();
            Ok(())
        })
    }
}
