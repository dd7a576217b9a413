//! Conversation storage abstraction
//!
//! The engine reads recent turns before answering and appends one assistant
//! turn per successful answer. Both backends implement [`ConversationStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use scholar::db::StoreProvider;
//!
//! // Ephemeral, for tests and one-shot runs
//! let store = StoreProvider::Memory.create_store().await?;
//!
//! // Append-only JSON lines file that survives restarts
//! let store = StoreProvider::File { path: "conversations.jsonl".into() }.create_store().await?;
//! ```

use crate::types::{ConversationSummary, Result, Turn, TurnId};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreProvider {
    /// In-process storage, lost on exit
    #[default]
    Memory,
    /// JSON lines file
    File {
        /// Path to the store file; created on first write
        path: String,
    },
}

impl StoreProvider {
    pub async fn create_store(&self) -> Result<Arc<dyn ConversationStore>> {
        match self {
            StoreProvider::Memory => Ok(Arc::new(super::memory::InMemoryStore::new())),
            StoreProvider::File { path } => {
                Ok(Arc::new(super::jsonl::JsonlStore::open(path).await?))
            }
        }
    }

    /// `None` or `":memory:"` selects the in-memory store.
    pub fn from_path(path: Option<&str>) -> Self {
        match path {
            Some(path) if !path.is_empty() && path != ":memory:" => StoreProvider::File {
                path: path.to_string(),
            },
            _ => StoreProvider::Memory,
        }
    }
}

/// Persistence for conversation turns
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Up to `limit` most recent turns, oldest first.
    async fn load_recent_turns(&self, conversation_id: &str, limit: usize) -> Result<Vec<Turn>>;

    /// Store a turn under `conversation_id` and return its id.
    async fn append_turn(&self, conversation_id: &str, turn: Turn) -> Result<TurnId>;

    /// Every stored conversation, most recently updated first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    /// Remove a conversation and all of its turns.
    ///
    /// Returns `false` when there was nothing to delete.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool>;

    /// Check if a conversation has any turns
    async fn conversation_exists(&self, conversation_id: &str) -> Result<bool> {
        Ok(!self.load_recent_turns(conversation_id, 1).await?.is_empty())
    }
}

/// Newest first, ties broken by id so listings are stable.
pub(crate) fn sort_summaries(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

/// Keep the last `limit` entries of an oldest-first list.
pub(crate) fn tail(mut turns: Vec<Turn>, limit: usize) -> Vec<Turn> {
    if turns.len() > limit {
        turns.drain(..turns.len() - limit);
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(StoreProvider::from_path(None), StoreProvider::Memory);
        assert_eq!(StoreProvider::from_path(Some(":memory:")), StoreProvider::Memory);
        assert_eq!(
            StoreProvider::from_path(Some("turns.jsonl")),
            StoreProvider::File {
                path: "turns.jsonl".to_string()
            }
        );
    }

    #[test]
    fn test_tail_keeps_newest() {
        let turns: Vec<Turn> = (0..5).map(|i| Turn::user("c", format!("m{}", i))).collect();
        let kept = tail(turns, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "m3");
        assert_eq!(kept[1].content, "m4");
        assert!(tail(Vec::new(), 3).is_empty());
    }
}
