//! Transcript message types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::types::HistoryEntry;
use crate::ids::{MessageId, MessageIdGenerator};

/// Text shown in place of a reply when a send fails.
///
/// Raw error details go to the log, never into the transcript.
pub const SEND_FAILED_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Author of a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The signed-in user.
    User,
    /// The backend agent.
    Assistant,
}

impl Role {
    /// Wire/display name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a wire role; roles other than user/assistant yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            r if r.eq_ignore_ascii_case("user") => Some(Self::User),
            r if r.eq_ignore_ascii_case("assistant") => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One entry of the displayed transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Client-side rendering key.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Message text, rendered verbatim.
    pub content: String,
    /// ISO-8601 timestamp.
    pub timestamp: String,
}

impl Message {
    /// Build a message stamped with the current time.
    #[must_use]
    pub fn now(ids: &MessageIdGenerator, role: Role, content: impl Into<String>) -> Self {
        let at = Utc::now();
        Self {
            id: ids.next_id(role, at),
            role,
            content: content.into(),
            timestamp: iso_timestamp(at),
        }
    }

    /// Synthetic assistant message standing in for a failed reply.
    #[must_use]
    pub fn send_failed(ids: &MessageIdGenerator) -> Self {
        Self::now(ids, Role::Assistant, SEND_FAILED_TEXT)
    }

    /// Hydrate a message from a persisted history entry.
    ///
    /// Entries with roles other than user/assistant are skipped.
    #[must_use]
    pub fn from_history(ids: &MessageIdGenerator, entry: HistoryEntry) -> Option<Self> {
        let role = Role::parse(&entry.role)?;
        let at = DateTime::parse_from_rfc3339(&entry.timestamp)
            .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc));
        let timestamp = if entry.timestamp.trim().is_empty() {
            iso_timestamp(at)
        } else {
            entry.timestamp
        };

        Some(Self {
            id: ids.next_id(role, at),
            role,
            content: entry.content,
            timestamp,
        })
    }

    /// Whether this message was written by the user.
    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self.role, Role::User)
    }
}

/// Format a timestamp as RFC 3339 with millisecond precision and `Z` suffix.
fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
