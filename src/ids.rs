//! Identifier types for the chat client.
//!
//! Type-heavy and logic-light: newtypes for compile-time safety plus the
//! small amount of generation logic the client needs.
//!
//! - [`SessionId`] is opaque and backend-assigned; the client never mints one.
//! - [`MessageId`] is a client-side rendering key, never sent anywhere.
//! - [`RequestId`] correlates log lines for a single backend call.

use core::fmt;
use core::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Role;

/// Identifier of a conversation, as assigned by the backend.
///
/// The value is opaque: no format is assumed beyond being a non-empty string.
/// Deserialization goes through [`SessionId::new`], so a blank id on the
/// wire is a decode error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

/// Errors returned when parsing a [`SessionId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
}

impl fmt::Display for SessionIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "session id must not be empty"),
        }
    }
}

impl std::error::Error for SessionIdError {}

impl SessionId {
    /// Build a session id, rejecting blank input.
    ///
    /// # Errors
    /// Returns [`SessionIdError::Empty`] if the input is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionIdError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(SessionIdError::Empty);
        }
        Ok(Self(raw))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into `String`.
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(value: SessionId) -> Self {
        value.into_string()
    }
}

/// Client-side key for a displayed message.
///
/// Carries no meaning beyond uniqueness within one transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generator for [`MessageId`]s.
///
/// Ids are `{role}-{millis}-{seq}`; the counter keeps two messages minted in
/// the same millisecond distinct.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    next: AtomicU64,
}

impl MessageIdGenerator {
    /// Create a generator starting at sequence zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Mint an id for a message of `role` submitted at `at`.
    #[must_use]
    pub fn next_id(&self, role: Role, at: DateTime<Utc>) -> MessageId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        MessageId(format!("{}-{}-{seq}", role.as_str(), at.timestamp_millis()))
    }
}

/// Correlation id for one backend call, attached to its log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Create a new random request id.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn session_id_rejects_blank() {
        assert_eq!(SessionId::new(""), Err(SessionIdError::Empty));
        assert_eq!("  ".parse::<SessionId>(), Err(SessionIdError::Empty));
    }

    #[test]
    fn session_id_is_opaque() {
        let id: SessionId = "user-42/abc def".parse().expect("non-empty id");
        assert_eq!(id.as_str(), "user-42/abc def");
        assert_eq!(id.to_string(), "user-42/abc def");
    }

    #[test]
    fn session_id_serializes_as_plain_string() {
        let id = SessionId::new("s1").expect("non-empty id");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"s1\"");
        let back: SessionId = serde_json::from_str("\"s1\"").expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn blank_session_id_fails_to_deserialize() {
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
        assert!(serde_json::from_str::<Vec<SessionId>>("[\"s1\", \" \"]").is_err());
    }

    #[test]
    fn message_ids_unique_within_same_millisecond() {
        let ids = MessageIdGenerator::new();
        let at = Utc::now();
        let minted: HashSet<MessageId> = (0..100).map(|_| ids.next_id(Role::User, at)).collect();
        assert_eq!(minted.len(), 100);
    }

    #[test]
    fn message_id_starts_with_role() {
        let ids = MessageIdGenerator::new();
        let id = ids.next_id(Role::Assistant, Utc::now());
        assert!(id.as_str().starts_with("assistant-"));
    }
}
