use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

// ============= Message Types =============

/// Speaker of a message or stored turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message handed to a generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ============= Conversation Types =============

/// Identifier assigned to a persisted turn by the conversation store.
pub type TurnId = String;

/// One persisted message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Free-form payload; assistant turns carry the turn metadata here.
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Build a new turn with a fresh identifier and the current timestamp.
    pub fn new(conversation_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            metadata: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::User, content)
    }

    pub fn assistant(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::Assistant, content)
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Listing entry for one stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    /// First user message, shortened.
    pub title: Option<String>,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const TITLE_CHARS: usize = 60;

impl ConversationSummary {
    /// Summarize an oldest-first list of turns; `None` when it is empty.
    pub fn from_turns(id: impl Into<String>, turns: &[Turn]) -> Option<Self> {
        let first = turns.first()?;
        let last = turns.last()?;
        let title = turns
            .iter()
            .find(|turn| turn.role == MessageRole::User)
            .map(|turn| {
                let content = turn.content.trim();
                if content.chars().count() > TITLE_CHARS {
                    format!("{}...", content.chars().take(TITLE_CHARS).collect::<String>())
                } else {
                    content.to_string()
                }
            });

        Some(Self {
            id: id.into(),
            title,
            turn_count: turns.len(),
            created_at: first.created_at,
            updated_at: last.created_at,
        })
    }
}

// ============= Intent Types =============

/// Classification of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Greeting,
    Capabilities,
    Clarification,
    FollowUp,
    Research,
    Other,
}

impl ConversationType {
    /// Every type, in the order presented to the classifier.
    pub const ALL: [ConversationType; 6] = [
        ConversationType::Greeting,
        ConversationType::Capabilities,
        ConversationType::Clarification,
        ConversationType::FollowUp,
        ConversationType::Research,
        ConversationType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Greeting => "greeting",
            ConversationType::Capabilities => "capabilities",
            ConversationType::Clarification => "clarification",
            ConversationType::FollowUp => "follow_up",
            ConversationType::Research => "research",
            ConversationType::Other => "other",
        }
    }

    /// Everything except `Research` is answered without the research pipeline.
    pub fn is_conversational(&self) -> bool {
        !matches!(self, ConversationType::Research)
    }

    /// Parse a classifier label, accepting the common synonyms models emit.
    ///
    /// Matching ignores case, surrounding whitespace, and `-`/space vs `_`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
            .to_lowercase()
            .replace(['-', ' '], "_");

        match normalized.as_str() {
            "greeting" | "greetings" => Some(ConversationType::Greeting),
            "capabilities" | "capability" | "identity" => Some(ConversationType::Capabilities),
            "clarification" | "clarify" => Some(ConversationType::Clarification),
            "follow_up" | "followup" => Some(ConversationType::FollowUp),
            "research" | "factual" | "explanation" => Some(ConversationType::Research),
            "other" | "chitchat" | "chit_chat" | "conversational" => Some(ConversationType::Other),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub conversation_type: ConversationType,
    pub primary_intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl IntentAnalysis {
    pub fn new(conversation_type: ConversationType, primary_intent: impl Into<String>) -> Self {
        Self {
            conversation_type,
            primary_intent: primary_intent.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// The classification used whenever the classifier cannot be trusted.
    pub fn research_fallback() -> Self {
        Self::new(ConversationType::Research, "research")
    }
}

// ============= Plan Types =============

/// Canonical identifier of a research agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One unit of work assigned to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent: AgentId,
    pub task: String,
    /// 1 (low) to 5 (high).
    pub priority: u8,
}

/// Ordered list of steps produced by the planner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    /// True when the planner output was unusable and the default plan was substituted.
    #[serde(default)]
    pub fallback: bool,
}

impl Plan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            steps,
            fallback: false,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of distinct agents referenced by the plan.
    pub fn distinct_agents(&self) -> usize {
        let mut agents: Vec<&AgentId> = self.steps.iter().map(|s| &s.agent).collect();
        agents.sort();
        agents.dedup();
        agents.len()
    }
}

// ============= Agent Result Types =============

/// Agent-specific result record, kept as an opaque JSON object until merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawItem(Map<String, Value>);

impl RawItem {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accepts only JSON objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First non-blank string value among `keys`, trimmed.
    pub fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.0.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// How an agent step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ok,
    Failed,
    TimedOut,
}

/// Outcome of executing one plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Index of the step in the plan; merge order follows it.
    pub step_index: usize,
    pub agent: AgentId,
    pub task: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub operations: Vec<String>,
    #[serde(default)]
    pub results: Vec<RawItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl AgentResult {
    pub fn completed(
        step_index: usize,
        step: &PlanStep,
        operations: Vec<String>,
        results: Vec<RawItem>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            step_index,
            agent: step.agent.clone(),
            task: step.task.clone(),
            status: AgentStatus::Ok,
            operations,
            results,
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(
        step_index: usize,
        step: &PlanStep,
        status: AgentStatus,
        error: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            step_index,
            agent: step.agent.clone(),
            task: step.task.clone(),
            status,
            operations: Vec::new(),
            results: Vec::new(),
            error: Some(error.into()),
            elapsed_ms,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AgentStatus::Ok
    }
}

// ============= Source Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Web,
    Academic,
}

/// A deduplicated reference shown alongside the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
}

// ============= Recommendation Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Topic,
    Concept,
    ResearchArea,
}

impl RecommendationType {
    /// Unknown labels degrade to `Topic`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "concept" => RecommendationType::Concept,
            "research_area" | "area" | "field" => RecommendationType::ResearchArea,
            _ => RecommendationType::Topic,
        }
    }
}

/// Suggested follow-up topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    /// Always within `[0.0, 1.0]`.
    pub relevance_score: f32,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that end a turn instead of being absorbed by a fallback.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppError::Agent(_) | AppError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
