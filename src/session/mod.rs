//! Conversational session history.
//!
//! A session is an append-only list of turns in the KV backend under
//! `session:<session_id>`, with a sliding TTL renewed on each append. The
//! stored list is capped at [`crate::constants::SESSION_LIST_MAX`] entries;
//! reads trim further to the caller's `max_turns`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hashing::session_key;
use crate::kv::{KvError, KvStore};

/// One question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    /// User question, verbatim.
    pub question: String,
    /// Generated answer.
    pub answer: String,
    /// Append time, UTC.
    pub timestamp: DateTime<Utc>,
}

/// Session history over the shared KV backend.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KvStore>,
}

impl SessionStore {
    /// Creates a store over `kv`.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Returns the last `max_turns` turns of `session_id`, oldest first.
    /// A missing or expired session is an empty history.
    pub async fn get_history(
        &self,
        session_id: &str,
        max_turns: usize,
    ) -> Result<Vec<Turn>, KvError> {
        let key = session_key(session_id);
        let raw = self.kv.list_tail(&key, max_turns as i64).await?;

        // A corrupt element is dropped, not fatal: losing one turn of
        // context beats failing the whole request.
        let turns = raw
            .iter()
            .filter_map(|entry| match serde_json::from_str::<Turn>(entry) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Dropping unreadable session turn");
                    None
                }
            })
            .collect();

        Ok(turns)
    }

    /// Appends a turn and slides the session TTL forward.
    pub async fn append_turn(
        &self,
        session_id: &str,
        question: &str,
        answer: &str,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let turn = Turn {
            question: question.to_string(),
            answer: answer.to_string(),
            timestamp: Utc::now(),
        };

        let key = session_key(session_id);
        let serialized = serde_json::to_string(&turn).map_err(|e| KvError::DecodeFailed {
            key: key.clone(),
            message: e.to_string(),
        })?;

        self.kv
            .list_push(&key, &serialized, crate::constants::SESSION_LIST_MAX, ttl)
            .await
    }

    /// Generates a fresh opaque session identifier.
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    fn store() -> (Arc<MemoryKv>, SessionStore) {
        let kv = Arc::new(MemoryKv::new());
        let sessions = SessionStore::new(kv.clone() as Arc<dyn KvStore>);
        (kv, sessions)
    }

    #[tokio::test]
    async fn test_append_then_read_roundtrip() {
        let (_kv, sessions) = store();
        let ttl = Duration::from_secs(60);

        sessions
            .append_turn("s1", "What is Rust?", "A systems language.", ttl)
            .await
            .unwrap();

        let history = sessions.get_history("s1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "What is Rust?");
        assert_eq!(history[0].answer, "A systems language.");
    }

    #[tokio::test]
    async fn test_history_bounded_by_max_turns() {
        let (_kv, sessions) = store();
        let ttl = Duration::from_secs(60);

        for i in 0..10 {
            sessions
                .append_turn("s1", &format!("q{i}"), &format!("a{i}"), ttl)
                .await
                .unwrap();
        }

        let history = sessions.get_history("s1", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].question, "q7");
        assert_eq!(history[2].question, "q9");
    }

    #[tokio::test]
    async fn test_missing_session_is_empty() {
        let (_kv, sessions) = store();
        let history = sessions.get_history("missing", 5).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_append_order_is_preserved() {
        let (_kv, sessions) = store();
        let ttl = Duration::from_secs(60);

        for question in ["first", "second", "third"] {
            sessions
                .append_turn("s1", question, "ok", ttl)
                .await
                .unwrap();
        }

        let history = sessions.get_history("s1", 10).await.unwrap();
        let questions: Vec<&str> = history.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_ttl_slides_on_append() {
        let (kv, sessions) = store();

        sessions
            .append_turn("s1", "q", "a", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // The second append resets the clock.
        sessions
            .append_turn("s1", "q2", "a2", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let history = sessions.get_history("s1", 10).await.unwrap();
        assert_eq!(history.len(), 2);

        let key = crate::hashing::session_key("s1");
        assert!(kv.ttl_of(&key).is_some());
    }

    #[tokio::test]
    async fn test_expired_session_reads_empty() {
        let (_kv, sessions) = store();

        sessions
            .append_turn("s1", "q", "a", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let history = sessions.get_history("s1", 10).await.unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_session_ids_are_unique_and_nonempty() {
        let a = SessionStore::new_session_id();
        let b = SessionStore::new_session_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_turn_serialization_uses_iso8601() {
        let turn = Turn {
            question: "q".to_string(),
            answer: "a".to_string(),
            timestamp: "2026-08-01T12:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("2026-08-01T12:00:00Z"));

        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
