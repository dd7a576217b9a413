//! Direct replies for turns that need no research.

use crate::llm::{CompletionOptions, LLMClient};
use crate::memory::{history_as_messages, truncate_history};
use crate::research::recommendations::{RecommendationGenerator, RecommendationSet};
use crate::types::{AppError, ChatMessage, ConversationType, IntentAnalysis, Result, Turn};
use std::sync::Arc;

/// Reply text plus the suggestions shown with it.
#[derive(Debug, Clone)]
pub struct ConversationReply {
    pub text: String,
    pub recommendations: RecommendationSet,
}

pub struct ConversationHandler {
    llm: Arc<dyn LLMClient>,
    recommender: Arc<RecommendationGenerator>,
    history_window: usize,
}

impl ConversationHandler {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        recommender: Arc<RecommendationGenerator>,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            recommender,
            history_window,
        }
    }

    /// Answer a conversational turn.
    ///
    /// A generation failure or an empty reply is returned as an error; there
    /// is no fallback text on this path.
    pub async fn respond(
        &self,
        message: &str,
        intent: &IntentAnalysis,
        history: &[Turn],
    ) -> Result<ConversationReply> {
        let kind = intent.conversation_type;
        let mut messages = vec![ChatMessage::system(Self::template(kind))];
        if Self::needs_history(kind) {
            messages.extend(history_as_messages(truncate_history(
                history,
                self.history_window,
            )));
        }
        messages.push(ChatMessage::user(message));

        tracing::debug!(conversation_type = %kind, "Generating conversational reply");
        let text = self
            .llm
            .complete(&messages, &CompletionOptions::text())
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::LLM("model returned an empty reply".to_string()));
        }

        let recommendations = self.recommender.generate(message, history).await;

        Ok(ConversationReply {
            text: text.to_string(),
            recommendations,
        })
    }

    /// Only replies that resolve earlier referents see the history.
    fn needs_history(kind: ConversationType) -> bool {
        matches!(
            kind,
            ConversationType::Clarification | ConversationType::FollowUp
        )
    }

    fn template(kind: ConversationType) -> &'static str {
        match kind {
            ConversationType::Greeting => {
                "You are a helpful research assistant responding to a casual greeting. \
                 Respond warmly and briefly, mentioning that you're ready to help with research topics. \
                 Keep your response under 3 sentences and conversational in tone."
            }
            ConversationType::Capabilities => {
                "You are a research assistant explaining your capabilities. \
                 Describe how you can help with academic research, finding papers, summarizing information \
                 and answering questions about scientific topics. Be specific about what kinds of \
                 research requests you can handle, and keep it short."
            }
            ConversationType::Clarification => {
                "You are a research assistant responding to a request for clarification. \
                 Look at the previous messages to understand what needs clarifying, then give a clear, \
                 friendly explanation grounded in that context."
            }
            ConversationType::FollowUp => {
                "You are a research assistant responding to a follow-up question. \
                 Use the previous messages to understand the context, then answer directly, building on \
                 the earlier conversation. Be concise but thorough."
            }
            ConversationType::Research | ConversationType::Other => {
                "You are a research assistant engaging in casual conversation. \
                 Respond in a helpful, friendly manner and keep it brief. If the message seems to be about \
                 research but is unclear, gently suggest how a more specific question would let you help."
            }
        }
    }
}
