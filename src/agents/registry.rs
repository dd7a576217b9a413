//! Agent Registry
//!
//! Holds the research agents available to the planner and executor and
//! resolves the names a model might use for them.

use crate::agents::{AcademicSearchAgent, ResearchAgent, WebSearchAgent};
use crate::types::AgentId;
use crate::utils::toml_config::ScholarConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct AgentRegistry {
    /// Agents in registration order
    agents: Vec<Arc<dyn ResearchAgent>>,
    /// Lowercased ids and aliases -> index into `agents`
    names: HashMap<String, usize>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Registry with the built-in agents, honoring `[agents.<id>]` settings.
    pub fn from_config(config: &ScholarConfig) -> Self {
        let mut registry = Self::new();

        let web = config.agent_settings(WebSearchAgent::ID);
        if web.enabled {
            registry.register(Arc::new(WebSearchAgent::new(
                web.max_results.unwrap_or(WebSearchAgent::DEFAULT_MAX_RESULTS),
            )));
        }

        let academic = config.agent_settings(AcademicSearchAgent::ID);
        if academic.enabled {
            let mut agent = AcademicSearchAgent::new(
                academic
                    .max_results
                    .unwrap_or(AcademicSearchAgent::DEFAULT_MAX_RESULTS),
            );
            if let Some(base_url) = academic.base_url.as_deref() {
                agent = agent.with_base_url(base_url);
            }
            registry.register(Arc::new(agent));
        }

        registry
    }

    /// Add an agent. An agent with the same id replaces the earlier one.
    pub fn register(&mut self, agent: Arc<dyn ResearchAgent>) {
        let id = agent.id().to_lowercase();
        let index = match self.names.get(&id) {
            Some(&existing) if self.agents[existing].id().eq_ignore_ascii_case(&id) => {
                self.agents[existing] = agent.clone();
                existing
            }
            _ => {
                self.agents.push(agent.clone());
                self.agents.len() - 1
            }
        };

        self.names.insert(id, index);
        for alias in agent.aliases() {
            // Canonical ids are never shadowed by another agent's alias.
            let alias = alias.to_lowercase();
            let taken_by_id = self
                .names
                .get(&alias)
                .is_some_and(|&i| i != index && self.agents[i].id().eq_ignore_ascii_case(&alias));
            if !taken_by_id {
                self.names.insert(alias, index);
            }
        }
    }

    /// Map an id or alias (any case, surrounding whitespace ignored) to the canonical id.
    pub fn resolve(&self, name: &str) -> Option<AgentId> {
        let key = name.trim().to_lowercase();
        let resolved = self
            .names
            .get(&key)
            .map(|&index| AgentId::new(self.agents[index].id()));
        if resolved.is_none() {
            debug!("Unknown agent name '{}'", name);
        }
        resolved
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<dyn ResearchAgent>> {
        self.names
            .get(&id.as_str().to_lowercase())
            .map(|&index| self.agents[index].clone())
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.get(id).is_some()
    }

    /// Canonical ids in registration order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.agents.iter().map(|a| AgentId::new(a.id())).collect()
    }

    /// `(id, description)` pairs in registration order.
    pub fn descriptors(&self) -> Vec<(AgentId, String)> {
        self.agents
            .iter()
            .map(|a| (AgentId::new(a.id()), a.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
