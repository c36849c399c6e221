//! Lifetime and ordering primitives shared by the chat components.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

use crate::error::{ChatError, ChatResult, NetworkError};

/// Cancellation scope of a component.
///
/// Once ended, every backend call started through [`Lifetime::guard`]
/// resolves to [`ChatError::Cancelled`] and its completion never reaches
/// component state.
#[derive(Clone, Debug, Default)]
pub struct Lifetime {
    token: CancellationToken,
}

impl Lifetime {
    /// Create a fresh, live scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a nested scope that ends with this one (or on its own).
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// End the scope.
    pub fn end(&self) {
        self.token.cancel();
    }

    /// Whether the scope has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run a backend call inside this scope.
    ///
    /// The call is dropped as soon as the scope ends.
    ///
    /// # Errors
    /// Returns [`ChatError::Cancelled`] if the scope ended first, or the
    /// call's own error.
    pub async fn guard<T, F>(&self, call: F) -> ChatResult<T>
    where
        F: Future<Output = Result<T, NetworkError>>,
    {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(ChatError::Cancelled),
            result = call => {
                if self.token.is_cancelled() {
                    return Err(ChatError::Cancelled);
                }
                result.map_err(ChatError::from)
            }
        }
    }
}

/// Monotonic request counter.
#[derive(Debug, Default)]
pub(crate) struct Sequence {
    issued: AtomicU64,
}

impl Sequence {
    /// Issue the next sequence number (starting at 1).
    pub(crate) fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether `seq` is the most recently issued number.
    pub(crate) fn is_latest(&self, seq: u64) -> bool {
        self.issued.load(Ordering::Acquire) == seq
    }
}
