pub mod academic;
pub mod registry;
pub mod web;

use crate::types::{RawItem, Result};
use async_trait::async_trait;
use tokio::time::Instant;

// Re-export commonly used types
pub use academic::AcademicSearchAgent;
pub use registry::AgentRegistry;
pub use web::WebSearchAgent;

/// What an agent hands back for one task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    /// Human-readable descriptions of the lookups performed.
    pub operations: Vec<String>,
    pub results: Vec<RawItem>,
}

/// A capability the executor can dispatch plan steps to.
///
/// Implementations should give up once `deadline` passes; the executor
/// cancels the call at the deadline regardless.
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    /// Canonical identifier used in plans.
    fn id(&self) -> &str;

    /// One-line summary shown to the planner.
    fn description(&self) -> &str;

    /// Alternative names the planner may use for this agent.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    async fn invoke(&self, task: &str, deadline: Instant) -> Result<AgentOutput>;
}
