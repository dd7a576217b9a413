//! General web search agent using daedra
//!
//! daedra uses DuckDuckGo as the search backend.

use crate::agents::{AgentOutput, ResearchAgent};
use crate::types::{AppError, RawItem, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

/// Web search agent powered by daedra
pub struct WebSearchAgent {
    max_results: usize,
}

impl WebSearchAgent {
    pub const ID: &'static str = "web_search";
    pub const DEFAULT_MAX_RESULTS: usize = 5;

    pub fn new(max_results: usize) -> Self {
        Self {
            max_results: max_results.max(1),
        }
    }
}

impl Default for WebSearchAgent {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RESULTS)
    }
}

#[async_trait]
impl ResearchAgent for WebSearchAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Searches the web for current information, documentation, news and general explanations"
    }

    fn aliases(&self) -> &[&str] {
        &["search_agent", "search", "web"]
    }

    async fn invoke(&self, task: &str, deadline: Instant) -> Result<AgentOutput> {
        let query = task.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Empty search query".to_string()));
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: self.max_results,
                ..Default::default()
            }),
        };

        let response =
            tokio::time::timeout_at(deadline, daedra::tools::search::perform_search(&search_args))
                .await
                .map_err(|_| AppError::Timeout(format!("web search for '{}'", query)))?
                .map_err(|e| AppError::Agent(format!("Search failed: {}", e)))?;

        let results: Vec<RawItem> = response
            .data
            .iter()
            .take(self.max_results)
            .filter_map(|r| {
                RawItem::from_value(json!({
                    "title": r.title,
                    "url": r.url,
                    "description": r.description
                }))
            })
            .collect();

        Ok(AgentOutput {
            operations: vec![format!("web_search: {}", query)],
            results,
        })
    }
}
