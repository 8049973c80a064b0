//! Dialogue session management
//!
//! Owns ordered, append-only conversation sessions keyed by session id.
//! Storage and retention are deliberately split: the manager never caps a
//! session on its own, it only exposes [`DialogueManager::truncate`] for the
//! orchestrator to apply its retention policy after each assistant turn.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Role of a message author within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a session, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One user's bounded conversation context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    /// Every id ever handed out, including cleared ones
    issued: HashSet<String>,
}

/// In-memory session store
///
/// All operations take `&self`; the session table is guarded by a mutex that
/// is never held across an await point.
#[derive(Debug, Default)]
pub struct DialogueManager {
    table: Mutex<SessionTable>,
}

impl DialogueManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionTable> {
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Create a new session for a user and return its id.
    ///
    /// The id is derived from the user id and creation timestamp; a sequence
    /// suffix disambiguates same-millisecond creations. Ids are checked
    /// against everything this manager has ever issued, so an id is never
    /// reused even after its session is cleared.
    pub fn create_session(&self, user_id: &str) -> String {
        let now = Utc::now();
        let mut table = self.lock();

        let base = format!("{user_id}_{}", now.format("%Y%m%d%H%M%S%3f"));
        let mut id = base.clone();
        let mut seq = 1u32;
        while table.issued.contains(&id) {
            id = format!("{base}_{seq}");
            seq += 1;
        }
        table.issued.insert(id.clone());

        table.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                user_id: user_id.to_string(),
                started_at: now,
                messages: Vec::new(),
                metadata: None,
            },
        );

        tracing::info!(session = %id, "session created");
        id
    }

    /// Append a message to a session with a server-assigned timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dialogue`] if the session does not exist.
    pub fn add_message(&self, session_id: &str, role: MessageRole, content: &str) -> Result<()> {
        let mut table = self.lock();
        let session = table
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::Dialogue(format!("session not found: {session_id}")))?;

        session.messages.push(Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });

        tracing::debug!(session = %session_id, role = role.as_str(), "message appended");
        Ok(())
    }

    /// Get a session's messages in chronological order, optionally limited to
    /// the most recent `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dialogue`] if the session does not exist.
    pub fn get_history(&self, session_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let table = self.lock();
        let session = table
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::Dialogue(format!("session not found: {session_id}")))?;

        let messages = &session.messages;
        let skip = limit.map_or(0, |n| messages.len().saturating_sub(n));
        Ok(messages[skip..].to_vec())
    }

    /// Get a snapshot of the full session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dialogue`] if the session does not exist.
    pub fn get_context(&self, session_id: &str) -> Result<Session> {
        self.lock()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::Dialogue(format!("session not found: {session_id}")))
    }

    /// Delete a session. No-op if the session does not exist.
    pub fn clear_session(&self, session_id: &str) {
        if self.lock().sessions.remove(session_id).is_some() {
            tracing::info!(session = %session_id, "session cleared");
        }
    }

    /// Drop oldest messages so the session holds at most `max` messages.
    ///
    /// This is the storage half of retention; deciding when and how much to
    /// trim is the orchestrator's job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dialogue`] if the session does not exist.
    pub fn truncate(&self, session_id: &str, max: usize) -> Result<()> {
        let mut table = self.lock();
        let session = table
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::Dialogue(format!("session not found: {session_id}")))?;

        let excess = session.messages.len().saturating_sub(max);
        if excess > 0 {
            session.messages.drain(..excess);
            tracing::debug!(session = %session_id, dropped = excess, "session truncated");
        }
        Ok(())
    }

    /// Number of live sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_preserved_in_call_order() {
        let manager = DialogueManager::new();
        let id = manager.create_session("alice");

        manager.add_message(&id, MessageRole::User, "first").unwrap();
        manager
            .add_message(&id, MessageRole::Assistant, "second")
            .unwrap();
        manager.add_message(&id, MessageRole::User, "third").unwrap();

        let history = manager.get_history(&id, None).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].content, "second");
        assert_eq!(history[2].content, "third");
    }

    #[test]
    fn test_history_limit_returns_most_recent() {
        let manager = DialogueManager::new();
        let id = manager.create_session("alice");

        for i in 0..5 {
            manager
                .add_message(&id, MessageRole::User, &format!("msg-{i}"))
                .unwrap();
        }

        let history = manager.get_history(&id, Some(2)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "msg-3");
        assert_eq!(history[1].content, "msg-4");

        // A limit larger than the log returns everything
        let all = manager.get_history(&id, Some(100)).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_unknown_session_errors() {
        let manager = DialogueManager::new();

        assert!(matches!(
            manager.add_message("nope", MessageRole::User, "hi"),
            Err(Error::Dialogue(_))
        ));
        assert!(matches!(
            manager.get_history("nope", None),
            Err(Error::Dialogue(_))
        ));
        assert!(matches!(
            manager.get_context("nope"),
            Err(Error::Dialogue(_))
        ));
        assert!(matches!(
            manager.truncate("nope", 10),
            Err(Error::Dialogue(_))
        ));
    }

    #[test]
    fn test_clear_session_is_idempotent() {
        let manager = DialogueManager::new();
        let id = manager.create_session("alice");
        assert_eq!(manager.session_count(), 1);

        manager.clear_session(&id);
        assert_eq!(manager.session_count(), 0);

        // Clearing again is a no-op, not an error
        manager.clear_session(&id);
        manager.clear_session("never-existed");
    }

    #[test]
    fn test_session_ids_not_reused_after_clear() {
        let manager = DialogueManager::new();
        let first = manager.create_session("alice");
        manager.clear_session(&first);

        // Same user, potentially the same millisecond: the cleared id must
        // never be handed out again.
        let second = manager.create_session("alice");
        assert_ne!(first, second);
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn test_session_ids_unique_per_user() {
        let manager = DialogueManager::new();
        let a = manager.create_session("alice");
        let b = manager.create_session("alice");
        assert_ne!(a, b);
        assert!(a.starts_with("alice_"));
        assert!(b.starts_with("alice_"));
    }

    #[test]
    fn test_truncate_keeps_most_recent_in_order() {
        let manager = DialogueManager::new();
        let id = manager.create_session("alice");

        for i in 0..6 {
            manager
                .add_message(&id, MessageRole::User, &format!("msg-{i}"))
                .unwrap();
        }

        manager.truncate(&id, 3).unwrap();
        let history = manager.get_history(&id, None).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, "msg-3");
        assert_eq!(history[2].content, "msg-5");

        // Truncating below the bound changes nothing
        manager.truncate(&id, 10).unwrap();
        assert_eq!(manager.get_history(&id, None).unwrap().len(), 3);
    }

    #[test]
    fn test_get_context_snapshot() {
        let manager = DialogueManager::new();
        let id = manager.create_session("bob");
        manager.add_message(&id, MessageRole::User, "hello").unwrap();

        let session = manager.get_context(&id).unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.user_id, "bob");
        assert_eq!(session.messages.len(), 1);
        assert!(session.metadata.is_none());
    }
}
