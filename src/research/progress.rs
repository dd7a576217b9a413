//! Turn progress state machine
//!
//! Each turn owns one [`ProgressTracker`]. The pipeline begins and completes
//! steps on it; observers read cloned [`ProcessingStatus`] snapshots through
//! the [`StatusRegistry`] without waiting on the turn.
//!
//! Research path:
//! `analyzing_intent → intent_analyzed → planning → plan_generated → executing →
//! execution_completed → synthesizing → generating_recommendations →
//! response_ready → completed`
//!
//! Conversational path: `analyzing_intent → intent_analyzed → completed`

use crate::research::router::RouteKind;
use crate::types::{AgentId, AgentStatus, IntentAnalysis, Plan};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    AnalyzingIntent,
    IntentAnalyzed,
    Planning,
    PlanGenerated,
    Executing,
    ExecutionCompleted,
    Synthesizing,
    GeneratingRecommendations,
    ResponseReady,
    Completed,
}

impl StepName {
    pub const RESEARCH_PATH: [StepName; 10] = [
        StepName::AnalyzingIntent,
        StepName::IntentAnalyzed,
        StepName::Planning,
        StepName::PlanGenerated,
        StepName::Executing,
        StepName::ExecutionCompleted,
        StepName::Synthesizing,
        StepName::GeneratingRecommendations,
        StepName::ResponseReady,
        StepName::Completed,
    ];

    pub const CONVERSATIONAL_PATH: [StepName; 3] = [
        StepName::AnalyzingIntent,
        StepName::IntentAnalyzed,
        StepName::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::AnalyzingIntent => "analyzing_intent",
            StepName::IntentAnalyzed => "intent_analyzed",
            StepName::Planning => "planning",
            StepName::PlanGenerated => "plan_generated",
            StepName::Executing => "executing",
            StepName::ExecutionCompleted => "execution_completed",
            StepName::Synthesizing => "synthesizing",
            StepName::GeneratingRecommendations => "generating_recommendations",
            StepName::ResponseReady => "response_ready",
            StepName::Completed => "completed",
        }
    }

    /// Human-readable status line shown while or after the step runs.
    pub fn label(&self) -> &'static str {
        match self {
            StepName::AnalyzingIntent => "Analyzing your message",
            StepName::IntentAnalyzed => "Intent identified",
            StepName::Planning => "Planning research",
            StepName::PlanGenerated => "Research plan ready",
            StepName::Executing => "Gathering information",
            StepName::ExecutionCompleted => "Information gathered",
            StepName::Synthesizing => "Writing the answer",
            StepName::GeneratingRecommendations => "Suggesting related topics",
            StepName::ResponseReady => "Response ready",
            StepName::Completed => "Done",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-agent line of the execution summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub step_index: usize,
    pub agent: AgentId,
    pub status: AgentStatus,
    pub result_count: usize,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Answered,
    Failed { message: String },
}

/// What a finished step recorded. One variant per [`StepName`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepDetail {
    AnalyzingIntent {
        history_turns: usize,
    },
    IntentAnalyzed {
        intent: IntentAnalysis,
        route: RouteKind,
    },
    Planning {
        available_agents: Vec<AgentId>,
    },
    PlanGenerated {
        plan: Plan,
    },
    Executing {
        step_count: usize,
        concurrency: usize,
    },
    ExecutionCompleted {
        /// Raw items returned by successful steps, before dedup.
        result_count: usize,
        operations: BTreeMap<AgentId, Vec<String>>,
        agents: Vec<AgentSummary>,
    },
    Synthesizing {
        source_count: usize,
    },
    GeneratingRecommendations {
        recommendation_count: usize,
        fallback: bool,
    },
    ResponseReady {
        answer_chars: usize,
    },
    Completed {
        outcome: TurnOutcome,
    },
}

impl StepDetail {
    pub fn step(&self) -> StepName {
        match self {
            StepDetail::AnalyzingIntent { .. } => StepName::AnalyzingIntent,
            StepDetail::IntentAnalyzed { .. } => StepName::IntentAnalyzed,
            StepDetail::Planning { .. } => StepName::Planning,
            StepDetail::PlanGenerated { .. } => StepName::PlanGenerated,
            StepDetail::Executing { .. } => StepName::Executing,
            StepDetail::ExecutionCompleted { .. } => StepName::ExecutionCompleted,
            StepDetail::Synthesizing { .. } => StepName::Synthesizing,
            StepDetail::GeneratingRecommendations { .. } => StepName::GeneratingRecommendations,
            StepDetail::ResponseReady { .. } => StepName::ResponseReady,
            StepDetail::Completed { .. } => StepName::Completed,
        }
    }
}

/// A completed step's record in [`ProcessingStatus::detailed_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub message: String,
    /// Milliseconds since the turn started, taken when the step finished.
    pub elapsed_ms: u64,
    pub detail: StepDetail,
}

/// Point-in-time view of a turn's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub steps_total: usize,
    pub steps_completed: Vec<StepName>,
    pub current_step: Option<StepName>,
    pub detailed_status: BTreeMap<StepName, StepRecord>,
    pub start_time: DateTime<Utc>,
    pub progress_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingStatus {
    fn new() -> Self {
        Self {
            steps_total: StepName::RESEARCH_PATH.len(),
            steps_completed: Vec::new(),
            current_step: None,
            detailed_status: BTreeMap::new(),
            start_time: Utc::now(),
            progress_percent: 0,
            error: None,
        }
    }

    pub fn detail(&self, step: StepName) -> Option<&StepDetail> {
        self.detailed_status.get(&step).map(|record| &record.detail)
    }

    pub fn is_completed(&self, step: StepName) -> bool {
        self.steps_completed.contains(&step)
    }

    /// True once the turn has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        self.is_completed(StepName::Completed) || self.error.is_some()
    }

    /// `result_count` recorded when execution finished.
    pub fn result_count(&self) -> Option<usize> {
        match self.detail(StepName::ExecutionCompleted) {
            Some(StepDetail::ExecutionCompleted { result_count, .. }) => Some(*result_count),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&TurnOutcome> {
        match self.detail(StepName::Completed) {
            Some(StepDetail::Completed { outcome }) => Some(outcome),
            _ => None,
        }
    }

    fn recompute_percent(&mut self) {
        let total = self.steps_total.max(1) as f64;
        let percent = (100.0 * self.steps_completed.len() as f64 / total).round();
        self.progress_percent = percent.clamp(0.0, 100.0) as u8;
    }
}

/// Writer side of one turn's status. Clones share the same state.
#[derive(Clone)]
pub struct ProgressTracker {
    status: Arc<RwLock<ProcessingStatus>>,
    started: Instant,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            status: Arc::new(RwLock::new(ProcessingStatus::new())),
            started: Instant::now(),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ProcessingStatus {
        self.status.read().clone()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.age().as_millis() as u64
    }

    fn age(&self) -> Duration {
        self.started.elapsed()
    }

    /// Switch to the three-step conversational sequence.
    pub fn use_conversational_path(&self) {
        let mut status = self.status.write();
        status.steps_total = StepName::CONVERSATIONAL_PATH.len();
        status.recompute_percent();
    }

    /// Mark `step` as in progress.
    pub fn begin(&self, step: StepName) {
        let mut status = self.status.write();
        if status.is_completed(step) {
            warn!("Ignoring begin of already completed step {}", step);
            return;
        }
        status.current_step = Some(step);
        debug!(step = %step, "step started");
    }

    /// Record `detail` for its step and append the step to `steps_completed`.
    pub fn complete(&self, detail: StepDetail) {
        let message = detail.step().label().to_string();
        self.complete_with_message(detail, message);
    }

    pub fn complete_with_message(&self, detail: StepDetail, message: impl Into<String>) {
        let step = detail.step();
        let elapsed_ms = self.elapsed_ms();
        let mut status = self.status.write();

        if status.is_completed(step) {
            warn!("Step {} already completed; keeping the first record", step);
            return;
        }
        if status.steps_completed.len() >= status.steps_total {
            warn!("Step {} exceeds the expected step count", step);
            return;
        }

        if status.current_step == Some(step) {
            status.current_step = None;
        }
        status.steps_completed.push(step);
        status.detailed_status.entry(step).or_insert(StepRecord {
            message: message.into(),
            elapsed_ms,
            detail,
        });
        status.recompute_percent();
        debug!(step = %step, elapsed_ms, "step completed");
    }

    /// End the turn with an error.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        {
            let mut status = self.status.write();
            status.current_step = None;
            status.error = Some(message.clone());
        }
        self.complete_with_message(
            StepDetail::Completed {
                outcome: TurnOutcome::Failed {
                    message: message.clone(),
                },
            },
            message,
        );
    }
}

/// Opaque handle for polling a turn's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusHandle(Uuid);

impl StatusHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StatusHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StatusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for StatusHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

struct RegistryInner {
    trackers: HashMap<StatusHandle, ProgressTracker>,
    order: VecDeque<StatusHandle>,
}

/// Unfinished turns older than this are treated as abandoned.
pub const STALE_STATUS_TTL: Duration = Duration::from_secs(60 * 60);

/// Trackers of recent turns, bounded by dropping the oldest finished ones.
///
/// Turns that never reach a terminal step (a caller registered a handle and
/// dropped the future) are dropped once they outlive the TTL.
pub struct StatusRegistry {
    inner: RwLock<RegistryInner>,
    capacity: usize,
    ttl: Duration,
}

impl StatusRegistry {
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(capacity, STALE_STATUS_TTL)
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                trackers: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn register(&self) -> (StatusHandle, ProgressTracker) {
        let handle = StatusHandle::new();
        let tracker = ProgressTracker::new();

        let mut inner = self.inner.write();
        let RegistryInner { trackers, order } = &mut *inner;
        order.retain(|h| {
            let stale = trackers
                .get(h)
                .is_none_or(|t| t.age() > self.ttl && !t.snapshot().is_terminal());
            if stale {
                trackers.remove(h);
                debug!(handle = %h, "evicted abandoned status");
            }
            !stale
        });

        inner.trackers.insert(handle, tracker.clone());
        inner.order.push_back(handle);

        while inner.trackers.len() > self.capacity {
            let oldest_terminal = inner.order.iter().position(|h| {
                inner
                    .trackers
                    .get(h)
                    .is_some_and(|t| t.snapshot().is_terminal())
            });
            let Some(position) = oldest_terminal else {
                break;
            };
            if let Some(evicted) = inner.order.remove(position) {
                inner.trackers.remove(&evicted);
                debug!(handle = %evicted, "evicted finished status");
            }
        }

        (handle, tracker)
    }

    pub fn tracker(&self, handle: StatusHandle) -> Option<ProgressTracker> {
        self.inner.read().trackers.get(&handle).cloned()
    }

    pub fn snapshot(&self, handle: StatusHandle) -> Option<ProcessingStatus> {
        self.tracker(handle).map(|tracker| tracker.snapshot())
    }

    pub fn len(&self) -> usize {
        self.inner.read().trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
