//! Turn orchestration
//!
//! [`ResearchCoordinator`] runs one turn end to end and exposes the two
//! operations callers use: [`process`](ResearchCoordinator::process) and
//! [`get_status`](ResearchCoordinator::get_status).

use crate::agents::AgentRegistry;
use crate::db::ConversationStore;
use crate::llm::{LLMClient, ProviderRegistry};
use crate::memory::without_pending_message;
use crate::research::conversation::ConversationHandler;
use crate::research::executor::{AgentExecutor, execution_summary};
use crate::research::merge::merge;
use crate::research::planner::Planner;
use crate::research::progress::{
    ProcessingStatus, ProgressTracker, StatusHandle, StatusRegistry, StepDetail, StepName,
    TurnOutcome,
};
use crate::research::recommendations::{RecommendationGenerator, RecommendationSet};
use crate::research::router::{IntentRouter, Route, RouteKind};
use crate::research::synthesis::SynthesisEngine;
use crate::types::{
    AgentId, AppError, IntentAnalysis, MessageRole, Recommendation, Result, Source, Turn, TurnId,
};
use crate::utils::toml_config::{PipelineConfig, PipelinePhase, ScholarConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// The model each pipeline phase talks to.
#[derive(Clone)]
pub struct PipelineModels {
    pub router: Arc<dyn LLMClient>,
    pub planner: Arc<dyn LLMClient>,
    pub conversation: Arc<dyn LLMClient>,
    pub synthesis: Arc<dyn LLMClient>,
    pub recommendation: Arc<dyn LLMClient>,
}

impl PipelineModels {
    /// Every phase on the same model.
    pub fn uniform(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            router: llm.clone(),
            planner: llm.clone(),
            conversation: llm.clone(),
            synthesis: llm.clone(),
            recommendation: llm,
        }
    }

    /// Build clients for the configured phase models. Phases naming the same
    /// model share one client.
    pub async fn from_registry(
        registry: &ProviderRegistry,
        pipeline: &PipelineConfig,
    ) -> Result<Self> {
        let mut clients: HashMap<String, Arc<dyn LLMClient>> = HashMap::new();
        for phase in PipelinePhase::ALL {
            let model = pipeline.model_for(phase);
            if !clients.contains_key(model) {
                let client = registry.create_client_for_model(model).await?;
                tracing::debug!(
                    phase = phase.config_key(),
                    model = client.model_name(),
                    "Created model client"
                );
                clients.insert(model.to_string(), Arc::from(client));
            }
        }

        let client = |phase: PipelinePhase| -> Result<Arc<dyn LLMClient>> {
            clients.get(pipeline.model_for(phase)).cloned().ok_or_else(|| {
                AppError::Internal(format!("no client for {}", phase.config_key()))
            })
        };

        Ok(Self {
            router: client(PipelinePhase::Routing)?,
            planner: client(PipelinePhase::Planning)?,
            conversation: client(PipelinePhase::Conversation)?,
            synthesis: client(PipelinePhase::Synthesis)?,
            recommendation: client(PipelinePhase::Recommendation)?,
        })
    }
}

/// What `process` returns for a successful turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub recommendations: Vec<Recommendation>,
    pub conversation_id: String,
    pub status_handle: StatusHandle,
    pub route: RouteKind,
    /// Id of the stored assistant turn; `None` if the store rejected it.
    pub turn_id: Option<TurnId>,
}

/// Metadata stored with each assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub route: RouteKind,
    pub intent: IntentAnalysis,
    pub processing_status: ProcessingStatus,
    pub sources: Vec<Source>,
    pub recommendations: Vec<Recommendation>,
}

/// Answer text and citations produced by either path.
struct Answer {
    text: String,
    sources: Vec<Source>,
    recommendations: Vec<Recommendation>,
}

pub struct ResearchCoordinator {
    router: IntentRouter,
    conversation: ConversationHandler,
    planner: Planner,
    executor: AgentExecutor,
    synthesis: SynthesisEngine,
    recommender: Arc<RecommendationGenerator>,
    agents: Arc<AgentRegistry>,
    store: Arc<dyn ConversationStore>,
    statuses: StatusRegistry,
    history_window: usize,
}

impl ResearchCoordinator {
    pub fn new(
        models: PipelineModels,
        agents: Arc<AgentRegistry>,
        store: Arc<dyn ConversationStore>,
        pipeline: &PipelineConfig,
    ) -> Self {
        let prompt_window = pipeline.prompt_history_window;
        let recommender = Arc::new(RecommendationGenerator::new(models.recommendation));

        Self {
            router: IntentRouter::new(models.router, prompt_window),
            conversation: ConversationHandler::new(
                models.conversation,
                recommender.clone(),
                prompt_window,
            ),
            planner: Planner::new(
                models.planner,
                agents.clone(),
                AgentId::new(pipeline.default_agent.as_str()),
                pipeline.max_plan_steps,
                prompt_window,
            ),
            executor: AgentExecutor::new(
                agents.clone(),
                Duration::from_secs(pipeline.agent_timeout_secs),
            ),
            synthesis: SynthesisEngine::new(
                models.synthesis,
                prompt_window,
                pipeline.max_sources_in_prompt,
            ),
            recommender,
            agents,
            store,
            statuses: StatusRegistry::new(pipeline.max_tracked_turns),
            history_window: pipeline.history_window,
        }
    }

    /// Wire up models and agents from configuration.
    pub async fn from_config(
        config: &ScholarConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self> {
        let providers = ProviderRegistry::from_config(config);
        let models = PipelineModels::from_registry(&providers, &config.pipeline).await?;
        let agents = Arc::new(AgentRegistry::from_config(config));
        if agents.is_empty() {
            return Err(AppError::Configuration(
                "no research agents are enabled".to_string(),
            ));
        }

        let mut coordinator = Self::new(models, agents, store, &config.pipeline);
        for (id, settings) in &config.agents {
            if let Some(secs) = settings.timeout_secs {
                coordinator.set_agent_timeout(AgentId::new(id.as_str()), Duration::from_secs(secs));
            }
        }
        Ok(coordinator)
    }

    pub fn set_agent_timeout(&mut self, agent: AgentId, timeout: Duration) {
        self.executor.set_timeout(agent, timeout);
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Allocate a status handle before calling [`process_tracked`](Self::process_tracked),
    /// so another task can poll it from the start.
    pub fn register_turn(&self) -> StatusHandle {
        self.statuses.register().0
    }

    /// Current snapshot for `handle`, or `None` once it has been evicted.
    pub fn get_status(&self, handle: StatusHandle) -> Option<ProcessingStatus> {
        self.statuses.snapshot(handle)
    }

    /// Recommendations for an existing conversation.
    ///
    /// Reuses the ones stored with the last assistant turn; otherwise generates
    /// them from the last user message and the recent history.
    pub async fn recommendations_for(&self, conversation_id: &str) -> Result<Vec<Recommendation>> {
        let history = self
            .store
            .load_recent_turns(conversation_id, self.history_window)
            .await?;
        if history.is_empty() {
            return Err(AppError::NotFound(format!("conversation {}", conversation_id)));
        }

        let stored = history
            .iter()
            .rev()
            .find(|turn| turn.role == MessageRole::Assistant)
            .and_then(|turn| serde_json::from_value::<TurnMetadata>(turn.metadata.clone()).ok())
            .map(|metadata| metadata.recommendations)
            .filter(|items| !items.is_empty());
        if let Some(items) = stored {
            return Ok(items);
        }

        let message = history
            .iter()
            .rev()
            .find(|turn| turn.role == MessageRole::User)
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();
        tracing::debug!(conversation_id, "No stored recommendations, generating");
        Ok(self.recommender.generate(message, &history).await.items)
    }

    /// Run one turn to completion.
    pub async fn process(
        &self,
        message: &str,
        conversation_id: Option<String>,
    ) -> Result<TurnResponse> {
        let handle = self.register_turn();
        self.process_tracked(handle, message, conversation_id).await
    }

    /// Run one turn, reporting progress under a handle from [`register_turn`](Self::register_turn).
    pub async fn process_tracked(
        &self,
        handle: StatusHandle,
        message: &str,
        conversation_id: Option<String>,
    ) -> Result<TurnResponse> {
        let tracker = self
            .statuses
            .tracker(handle)
            .ok_or_else(|| AppError::NotFound(format!("status handle {}", handle)))?;

        let message = message.trim();
        if message.is_empty() {
            let err = AppError::InvalidInput("message must not be empty".to_string());
            tracker.fail(err.to_string());
            return Err(err);
        }

        let conversation_id = conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = tracing::info_span!("turn", %handle, conversation_id = %conversation_id);

        self.run_turn(&tracker, handle, message, conversation_id)
            .instrument(span)
            .await
    }

    async fn run_turn(
        &self,
        tracker: &ProgressTracker,
        handle: StatusHandle,
        message: &str,
        conversation_id: String,
    ) -> Result<TurnResponse> {
        tracker.begin(StepName::AnalyzingIntent);
        let history = match self
            .store
            .load_recent_turns(&conversation_id, self.history_window)
            .await
        {
            Ok(turns) => turns,
            Err(e) => {
                tracing::warn!("Could not load history, continuing without it: {}", e);
                Vec::new()
            }
        };
        let history = without_pending_message(&history, message);

        let route = self.router.route(message, history).await;
        tracker.complete(StepDetail::AnalyzingIntent {
            history_turns: history.len(),
        });
        if matches!(route, Route::Conversational(_)) {
            tracker.use_conversational_path();
        }
        tracker.complete(StepDetail::IntentAnalyzed {
            intent: route.intent().clone(),
            route: route.kind(),
        });
        tracing::info!(
            route = ?route.kind(),
            conversation_type = %route.intent().conversation_type,
            "Turn routed"
        );

        let answer = match &route {
            Route::Conversational(intent) => {
                self.answer_conversational(tracker, message, intent, history)
                    .await
            }
            Route::Research(intent) => {
                self.answer_research(tracker, message, intent, history)
                    .await
            }
        };

        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Turn failed: {}", e);
                tracker.fail(e.to_string());
                return Err(e);
            }
        };

        tracker.complete(StepDetail::Completed {
            outcome: TurnOutcome::Answered,
        });
        let turn_id = self
            .persist(&conversation_id, &route, tracker.snapshot(), &answer)
            .await;
        tracing::info!(
            sources = answer.sources.len(),
            recommendations = answer.recommendations.len(),
            elapsed_ms = tracker.elapsed_ms(),
            "Turn completed"
        );

        Ok(TurnResponse {
            answer: answer.text,
            sources: answer.sources,
            recommendations: answer.recommendations,
            conversation_id,
            status_handle: handle,
            route: route.kind(),
            turn_id,
        })
    }

    async fn answer_conversational(
        &self,
        tracker: &ProgressTracker,
        message: &str,
        intent: &IntentAnalysis,
        history: &[Turn],
    ) -> Result<Answer> {
        tracker.begin(StepName::Completed);
        let reply = self.conversation.respond(message, intent, history).await?;
        Ok(Answer {
            text: reply.text,
            sources: Vec::new(),
            recommendations: reply.recommendations.items,
        })
    }

    async fn answer_research(
        &self,
        tracker: &ProgressTracker,
        message: &str,
        intent: &IntentAnalysis,
        history: &[Turn],
    ) -> Result<Answer> {
        tracker.begin(StepName::Planning);
        let plan = self.planner.plan(message, intent, history).await;
        tracker.complete(StepDetail::Planning {
            available_agents: self.agents.ids(),
        });
        tracker.complete(StepDetail::PlanGenerated { plan: plan.clone() });

        tracker.begin(StepName::Executing);
        let results = self.executor.execute(&plan).await;
        tracker.complete(StepDetail::Executing {
            step_count: plan.len(),
            concurrency: AgentExecutor::concurrency(&plan),
        });
        tracker.complete(execution_summary(&results));

        let sources = merge(&results);
        tracing::info!(
            steps = results.len(),
            succeeded = results.iter().filter(|r| r.is_ok()).count(),
            sources = sources.len(),
            "Execution merged"
        );

        tracker.begin(StepName::Synthesizing);
        let text = self.synthesis.synthesize(message, history, &sources).await?;
        tracker.complete(StepDetail::Synthesizing {
            source_count: sources.len(),
        });

        tracker.begin(StepName::GeneratingRecommendations);
        let RecommendationSet { items, fallback } =
            self.recommender.generate(message, history).await;
        tracker.complete(StepDetail::GeneratingRecommendations {
            recommendation_count: items.len(),
            fallback,
        });

        tracker.complete(StepDetail::ResponseReady {
            answer_chars: text.chars().count(),
        });

        Ok(Answer {
            text,
            sources,
            recommendations: items,
        })
    }

    /// Store the assistant turn. Failures are logged, never returned.
    async fn persist(
        &self,
        conversation_id: &str,
        route: &Route,
        status: ProcessingStatus,
        answer: &Answer,
    ) -> Option<TurnId> {
        let metadata = TurnMetadata {
            route: route.kind(),
            intent: route.intent().clone(),
            processing_status: status,
            sources: answer.sources.clone(),
            recommendations: answer.recommendations.clone(),
        };
        let metadata = match serde_json::to_value(&metadata) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Could not serialize turn metadata: {}", e);
                serde_json::Value::Null
            }
        };

        let turn = Turn::assistant(conversation_id, answer.text.as_str()).with_metadata(metadata);
        match self.store.append_turn(conversation_id, turn).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Could not store assistant turn: {}", e);
                None
            }
        }
    }
}
