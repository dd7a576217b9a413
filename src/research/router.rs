//! Intent routing
//!
//! Classifies each message once and picks the conversational shortcut or the
//! full research pipeline. Classification never fails: anything the router
//! cannot interpret is treated as research so the question is still answered.

use crate::llm::{CompletionOptions, LLMClient, extract_json};
use crate::memory::{history_as_messages, truncate_history};
use crate::types::{ChatMessage, ConversationType, IntentAnalysis, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Phrases that are always greetings when they make up a short message.
const BASIC_GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "greetings",
    "howdy",
    "hiya",
    "whats up",
    "what's up",
    "good morning",
    "good afternoon",
    "good evening",
];

const SMALL_TALK: &[&str] = &["how are you", "how's it going", "hows it going"];

/// Words that may trail a greeting without turning it into a question.
const ADDRESSEES: &[&str] = &["there", "scholar", "everyone", "all", "friend", "again", "today"];

/// Messages longer than this are never treated as a bare greeting.
const MAX_GREETING_WORDS: usize = 4;

/// Which pipeline handles the turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Conversational(IntentAnalysis),
    Research(IntentAnalysis),
}

/// Route without its payload, for status records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Conversational,
    Research,
}

impl Route {
    pub fn from_intent(intent: IntentAnalysis) -> Self {
        if intent.conversation_type.is_conversational() {
            Route::Conversational(intent)
        } else {
            Route::Research(intent)
        }
    }

    pub fn intent(&self) -> &IntentAnalysis {
        match self {
            Route::Conversational(intent) | Route::Research(intent) => intent,
        }
    }

    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Conversational(_) => RouteKind::Conversational,
            Route::Research(_) => RouteKind::Research,
        }
    }
}

/// Intent router backed by a classification model.
pub struct IntentRouter {
    llm: Arc<dyn LLMClient>,
    history_window: usize,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LLMClient>, history_window: usize) -> Self {
        Self {
            llm,
            history_window,
        }
    }

    pub async fn route(&self, message: &str, history: &[Turn]) -> Route {
        Route::from_intent(self.classify(message, history).await)
    }

    /// Classify `message` given recent `history`.
    pub async fn classify(&self, message: &str, history: &[Turn]) -> IntentAnalysis {
        if let Some(intent) = Self::quick_check(message) {
            tracing::debug!(
                conversation_type = %intent.conversation_type,
                "Quick check classified message"
            );
            return intent;
        }

        let mut messages = vec![ChatMessage::system(Self::system_prompt())];
        messages.extend(history_as_messages(truncate_history(
            history,
            self.history_window,
        )));
        messages.push(ChatMessage::user(message));

        let output = match self
            .llm
            .complete(&messages, &CompletionOptions::structured().with_temperature(0.0))
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Intent classification failed, defaulting to research: {}", e);
                return IntentAnalysis::research_fallback();
            }
        };

        match Self::parse_classification(&output) {
            Some(intent) => {
                tracing::info!(
                    conversation_type = %intent.conversation_type,
                    primary_intent = %intent.primary_intent,
                    "Intent classified"
                );
                intent
            }
            None => {
                tracing::debug!(
                    "Router could not parse output '{}', defaulting to research",
                    output
                );
                IntentAnalysis::research_fallback()
            }
        }
    }

    /// Classify obvious messages without a model call.
    pub fn quick_check(message: &str) -> Option<IntentAnalysis> {
        let normalized = message
            .trim()
            .to_lowercase()
            .trim_end_matches(|c: char| matches!(c, '?' | '!' | '.' | ','))
            .trim()
            .to_string();

        if normalized.starts_with("explain") {
            return Some(IntentAnalysis::new(ConversationType::Research, "explanation"));
        }

        let word_count = normalized.split_whitespace().count();
        if word_count == 0 || word_count > MAX_GREETING_WORDS {
            return None;
        }

        is_small_talk(&normalized).then(|| IntentAnalysis::new(ConversationType::Greeting, "greeting"))
    }

    /// Interpret classifier output.
    ///
    /// This handles various output formats:
    /// - JSON: `{"conversation_type": "greeting", "primary_intent": "...", "confidence": 0.9}`
    /// - JSON without `conversation_type` but with a recognizable `primary_intent`
    /// - A bare label: `"follow_up"` or `"Category: capabilities"`
    pub fn parse_classification(output: &str) -> Option<IntentAnalysis> {
        match extract_json(output) {
            Some(Value::Object(fields)) => Self::from_fields(&fields),
            Some(Value::String(label)) => Self::from_label_text(&label),
            _ => Self::from_label_text(output),
        }
    }

    fn from_fields(fields: &serde_json::Map<String, Value>) -> Option<IntentAnalysis> {
        let label = |key: &str| fields.get(key).and_then(Value::as_str);

        let conversation_type = ["conversation_type", "type", "intent"]
            .iter()
            .find_map(|key| label(key).and_then(ConversationType::from_label))
            .or_else(|| label("primary_intent").and_then(ConversationType::from_label))
            .or_else(|| {
                fields
                    .get("is_conversational")
                    .and_then(Value::as_bool)
                    .map(|conversational| {
                        if conversational {
                            ConversationType::Other
                        } else {
                            ConversationType::Research
                        }
                    })
            })?;

        let primary_intent = label("primary_intent")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(conversation_type.as_str());

        let mut intent = IntentAnalysis::new(conversation_type, primary_intent);
        if let Some(confidence) = fields.get("confidence").and_then(Value::as_f64) {
            intent = intent.with_confidence(confidence as f32);
        }
        Some(intent)
    }

    /// Short free-text answers: exact label first, then word by word.
    fn from_label_text(text: &str) -> Option<IntentAnalysis> {
        let trimmed = text.trim();
        if let Some(kind) = ConversationType::from_label(trimmed) {
            return Some(IntentAnalysis::new(kind, kind.as_str()));
        }

        let words: Vec<&str> = trimmed
            .split(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '.' | '"' | '\''))
            .filter(|w| !w.is_empty())
            .collect();
        if words.len() > 6 {
            return None;
        }

        words
            .iter()
            .find_map(|word| ConversationType::from_label(word))
            .map(|kind| IntentAnalysis::new(kind, kind.as_str()))
    }

    fn system_prompt() -> String {
        r#"You classify messages sent to a research assistant.

Categories:
- greeting: hellos, small talk such as "how are you" or "what's up"
- capabilities: questions about the assistant itself, its name, or what it can do
- clarification: the user asks what a previous answer meant or asks to rephrase it
- follow_up: a short continuation of the previous topic that depends on earlier turns
- research: questions that need looking up information, papers, or explanations of concepts
- other: anything conversational that fits none of the above

Requests to "explain" a concept or "what is X" are research.

Respond with JSON only:
{"conversation_type": "<category>", "primary_intent": "<a few words>", "confidence": <0.0-1.0>}"#
            .to_string()
    }
}

/// True when `text` is greeting phrases, optionally followed by an addressee.
///
/// Phrases only match at the start of the text and on a word boundary, so
/// "what's up with GPT-5" or "history of transformers" fall through.
fn is_small_talk(text: &str) -> bool {
    BASIC_GREETINGS.iter().chain(SMALL_TALK).any(|phrase| {
        let Some(rest) = text.strip_prefix(phrase) else {
            return false;
        };
        if rest.starts_with(|c: char| c.is_alphanumeric() || c == '\'') {
            return false;
        }

        let rest = rest.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '!' | '?' | '.'));
        rest.is_empty()
            || rest
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|word| !word.is_empty())
                .all(|word| ADDRESSEES.contains(&word))
            || is_small_talk(rest)
    })
}
