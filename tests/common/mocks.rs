//! Mock implementations for testing.
//!
//! Scripted LLM clients and agents shared by the integration tests, so
//! pipeline scenarios run without a model server or network access.

use async_trait::async_trait;
use parking_lot::Mutex;
use scholar::agents::{AgentOutput, ResearchAgent};
use scholar::llm::{CompletionOptions, LLMClient};
use scholar::types::{AppError, ChatMessage, RawItem, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// LLM client that replays scripted replies.
///
/// Queued replies are returned first, in order; after that every call gets
/// the fixed reply (or an error when the client was built with
/// [`ScriptedLLM::failing`]).
pub struct ScriptedLLM {
    queue: Mutex<VecDeque<std::result::Result<String, String>>>,
    fixed: std::result::Result<String, String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLLM {
    pub fn fixed(reply: &str) -> Arc<Self> {
        Arc::new(Self::with_fixed(Ok(reply.to_string())))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self::with_fixed(Err(message.to_string())))
    }

    /// Replies in order, then `then` for any further call.
    pub fn sequence(replies: &[&str], then: &str) -> Arc<Self> {
        let llm = Self::with_fixed(Ok(then.to_string()));
        llm.queue
            .lock()
            .extend(replies.iter().map(|r| Ok(r.to_string())));
        Arc::new(llm)
    }

    fn with_fixed(fixed: std::result::Result<String, String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fixed,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Concatenated message contents of the most recent call.
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().map(|messages| {
            messages
                .iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn complete(&self, messages: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(messages.to_vec());
        let reply = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fixed.clone());
        reply.map_err(AppError::LLM)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

enum AgentBehavior {
    Items(Vec<RawItem>),
    Sleep(Duration),
    Fail(String),
}

/// Research agent with a fixed behavior and an invocation log.
pub struct MockAgent {
    id: &'static str,
    behavior: AgentBehavior,
    delay: Duration,
    calls: AtomicUsize,
    tasks: Mutex<Vec<String>>,
}

impl MockAgent {
    /// Returns `items` after `delay`.
    pub fn returning(id: &'static str, items: Vec<RawItem>) -> Arc<Self> {
        Self::build(id, AgentBehavior::Items(items), Duration::ZERO)
    }

    pub fn returning_after(id: &'static str, items: Vec<RawItem>, delay: Duration) -> Arc<Self> {
        Self::build(id, AgentBehavior::Items(items), delay)
    }

    /// Never answers within any reasonable deadline.
    pub fn hanging(id: &'static str) -> Arc<Self> {
        Self::build(id, AgentBehavior::Sleep(Duration::from_secs(30)), Duration::ZERO)
    }

    pub fn failing(id: &'static str, error: &str) -> Arc<Self> {
        Self::build(id, AgentBehavior::Fail(error.to_string()), Duration::ZERO)
    }

    fn build(id: &'static str, behavior: AgentBehavior, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            behavior,
            delay,
            calls: AtomicUsize::new(0),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().clone()
    }
}

#[async_trait]
impl ResearchAgent for MockAgent {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        "mock research agent"
    }

    async fn invoke(&self, task: &str, _deadline: Instant) -> Result<AgentOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tasks.lock().push(task.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            AgentBehavior::Items(items) => Ok(AgentOutput {
                operations: vec![format!("search: {}", task)],
                results: items.clone(),
            }),
            AgentBehavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(AgentOutput::default())
            }
            AgentBehavior::Fail(error) => Err(AppError::Agent(error.clone())),
        }
    }
}

/// A web-style result item.
pub fn web_item(url: &str, title: &str) -> RawItem {
    RawItem::new()
        .with("link", url)
        .with("title", title)
        .with("snippet", format!("About {}", title))
}

/// An arXiv-style result item.
pub fn paper_item(arxiv_id: &str, title: &str) -> RawItem {
    RawItem::new()
        .with("id", arxiv_id)
        .with("url", format!("https://arxiv.org/abs/{}", arxiv_id))
        .with("title", title)
        .with("abstract", format!("Abstract of {}", title))
        .with("authors", serde_json::json!(["A. Author", "B. Author"]))
}
