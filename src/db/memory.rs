use crate::db::traits::{ConversationStore, sort_summaries, tail};
use crate::types::{ConversationSummary, Result, Turn, TurnId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-process conversation store.
#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored turn of a conversation, oldest first.
    pub fn turns(&self, conversation_id: &str) -> Vec<Turn> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Every stored turn, grouped by conversation.
    pub fn all_turns(&self) -> Vec<Turn> {
        self.conversations.read().values().flatten().cloned().collect()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load_recent_turns(&self, conversation_id: &str, limit: usize) -> Result<Vec<Turn>> {
        Ok(tail(self.turns(conversation_id), limit))
    }

    async fn append_turn(&self, conversation_id: &str, mut turn: Turn) -> Result<TurnId> {
        turn.conversation_id = conversation_id.to_string();
        let id = turn.id.clone();
        self.conversations
            .write()
            .entry(conversation_id.to_string())
            .or_default()
            .push(turn);
        Ok(id)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> = self
            .conversations
            .read()
            .iter()
            .filter_map(|(id, turns)| ConversationSummary::from_turns(id.as_str(), turns))
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        Ok(self.conversations.write().remove(conversation_id).is_some())
    }
}
