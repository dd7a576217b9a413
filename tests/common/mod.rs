//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mocks;

use mocks::{MockAgent, ScriptedLLM};
use scholar::agents::AgentRegistry;
use scholar::db::{ConversationStore, InMemoryStore};
use scholar::research::{PipelineModels, ResearchCoordinator};
use scholar::utils::toml_config::PipelineConfig;
use std::sync::Arc;

pub const RESEARCH_INTENT: &str =
    r#"{"conversation_type": "research", "primary_intent": "compare architectures", "confidence": 0.9}"#;

pub const RECOMMENDATIONS: &str = r#"[
    {"title": "Attention mechanisms", "description": "How attention replaced recurrence.", "type": "concept", "relevance_score": 0.9},
    {"title": "Neural machine translation", "description": "Benchmarks and datasets.", "type": "research_area", "relevance_score": 0.8}
]"#;

/// One scripted model per pipeline phase.
pub struct Models {
    pub router: Arc<ScriptedLLM>,
    pub planner: Arc<ScriptedLLM>,
    pub conversation: Arc<ScriptedLLM>,
    pub synthesis: Arc<ScriptedLLM>,
    pub recommendation: Arc<ScriptedLLM>,
}

impl Models {
    /// A research turn whose planner replies with `plan`.
    pub fn research(plan: &str) -> Self {
        Self {
            router: ScriptedLLM::fixed(RESEARCH_INTENT),
            planner: ScriptedLLM::fixed(plan),
            conversation: ScriptedLLM::fixed("Happy to help."),
            synthesis: ScriptedLLM::fixed("Transformers parallelize over tokens [1]."),
            recommendation: ScriptedLLM::fixed(RECOMMENDATIONS),
        }
    }

    pub fn pipeline(&self) -> PipelineModels {
        PipelineModels {
            router: self.router.clone(),
            planner: self.planner.clone(),
            conversation: self.conversation.clone(),
            synthesis: self.synthesis.clone(),
            recommendation: self.recommendation.clone(),
        }
    }
}

pub fn registry(agents: &[Arc<MockAgent>]) -> Arc<AgentRegistry> {
    let mut registry = AgentRegistry::new();
    for agent in agents {
        registry.register(agent.clone());
    }
    Arc::new(registry)
}

pub fn coordinator(
    models: &Models,
    agents: &[Arc<MockAgent>],
    store: Arc<InMemoryStore>,
) -> ResearchCoordinator {
    let store: Arc<dyn ConversationStore> = store;
    ResearchCoordinator::new(
        models.pipeline(),
        registry(agents),
        store,
        &PipelineConfig::default(),
    )
}
