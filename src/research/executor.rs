//! Concurrent plan execution
//!
//! Every step runs in its own task with its own deadline and writes only its
//! own result slot. The executor returns exactly one [`AgentResult`] per plan
//! step, in plan order, and never fails as a whole.

use crate::agents::{AgentRegistry, ResearchAgent};
use crate::research::progress::{AgentSummary, StepDetail};
use crate::types::{AgentId, AgentResult, AgentStatus, AppError, Plan, PlanStep};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, info_span};

pub struct AgentExecutor {
    agents: Arc<AgentRegistry>,
    default_timeout: Duration,
    timeouts: HashMap<AgentId, Duration>,
}

impl AgentExecutor {
    pub fn new(agents: Arc<AgentRegistry>, default_timeout: Duration) -> Self {
        Self {
            agents,
            default_timeout,
            timeouts: HashMap::new(),
        }
    }

    /// Per-agent deadline overriding the default.
    pub fn with_timeout(mut self, agent: AgentId, timeout: Duration) -> Self {
        self.set_timeout(agent, timeout);
        self
    }

    pub fn set_timeout(&mut self, agent: AgentId, timeout: Duration) {
        self.timeouts.insert(agent, timeout);
    }

    pub fn timeout_for(&self, agent: &AgentId) -> Duration {
        self.timeouts
            .get(agent)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Number of steps allowed to run at once.
    pub fn concurrency(plan: &Plan) -> usize {
        plan.distinct_agents().max(1)
    }

    pub async fn execute(&self, plan: &Plan) -> Vec<AgentResult> {
        let mut slots: Vec<Option<AgentResult>> = vec![None; plan.len()];
        let semaphore = Arc::new(Semaphore::new(Self::concurrency(plan)));
        let mut set = JoinSet::new();
        let mut task_slots = HashMap::new();

        for (index, step) in plan.steps.iter().enumerate() {
            let Some(agent) = self.agents.get(&step.agent) else {
                tracing::warn!(agent = %step.agent, "Skipping step for unregistered agent");
                slots[index] = Some(AgentResult::failed(
                    index,
                    step,
                    AgentStatus::Failed,
                    format!("unknown agent '{}'", step.agent),
                    0,
                ));
                continue;
            };

            let step = step.clone();
            let timeout = self.timeout_for(&step.agent);
            let semaphore = semaphore.clone();
            let span = info_span!("agent_step", index, agent = %step.agent);

            let handle = set.spawn(
                async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return AgentResult::failed(
                                index,
                                &step,
                                AgentStatus::Failed,
                                "executor shut down",
                                0,
                            );
                        }
                    };
                    run_step(index, &step, agent, timeout).await
                }
                .instrument(span),
            );
            task_slots.insert(handle.id(), index);
        }

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, result)) => {
                    let index = result.step_index;
                    slots[index] = Some(result);
                }
                Err(e) => {
                    if let Some(&index) = task_slots.get(&e.id()) {
                        tracing::error!("Agent step {} aborted: {}", index, e);
                        slots[index] = Some(AgentResult::failed(
                            index,
                            &plan.steps[index],
                            AgentStatus::Failed,
                            format!("agent task aborted: {}", e),
                            0,
                        ));
                    }
                }
            }
        }

        slots
            .into_iter()
            .zip(&plan.steps)
            .enumerate()
            .map(|(index, (slot, step))| {
                slot.unwrap_or_else(|| {
                    AgentResult::failed(
                        index,
                        step,
                        AgentStatus::Failed,
                        "step did not report a result",
                        0,
                    )
                })
            })
            .collect()
    }
}

/// Invoke one agent under its deadline. The clock starts once the step holds a permit.
async fn run_step(
    index: usize,
    step: &PlanStep,
    agent: Arc<dyn ResearchAgent>,
    timeout: Duration,
) -> AgentResult {
    let started = Instant::now();
    let deadline = started + timeout;

    let outcome = timeout_at(deadline, agent.invoke(&step.task, deadline)).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(Ok(output)) => AgentResult::completed(
            index,
            step,
            output.operations,
            output.results,
            elapsed_ms,
        ),
        Ok(Err(AppError::Timeout(message))) => {
            AgentResult::failed(index, step, AgentStatus::TimedOut, message, elapsed_ms)
        }
        Ok(Err(e)) => {
            AgentResult::failed(index, step, AgentStatus::Failed, e.to_string(), elapsed_ms)
        }
        Err(_) => AgentResult::failed(
            index,
            step,
            AgentStatus::TimedOut,
            format!("timed out after {}ms", timeout.as_millis()),
            elapsed_ms,
        ),
    };

    match result.status {
        AgentStatus::Ok => tracing::info!(
            results = result.results.len(),
            elapsed_ms,
            "Agent step completed"
        ),
        _ => tracing::warn!(
            status = ?result.status,
            error = result.error.as_deref().unwrap_or_default(),
            "Agent step did not complete"
        ),
    }
    result
}

/// Detail recorded for `execution_completed`.
///
/// `result_count` counts raw items of successful steps, before dedup.
pub fn execution_summary(results: &[AgentResult]) -> StepDetail {
    let mut operations: BTreeMap<AgentId, Vec<String>> = BTreeMap::new();
    for result in results {
        operations
            .entry(result.agent.clone())
            .or_default()
            .extend(result.operations.iter().cloned());
    }

    StepDetail::ExecutionCompleted {
        result_count: results
            .iter()
            .filter(|r| r.is_ok())
            .map(|r| r.results.len())
            .sum(),
        operations,
        agents: results
            .iter()
            .map(|r| AgentSummary {
                step_index: r.step_index,
                agent: r.agent.clone(),
                status: r.status,
                result_count: r.results.len(),
                elapsed_ms: r.elapsed_ms,
                error: r.error.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentOutput;
    use crate::types::{RawItem, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Items(usize),
        Sleep(Duration),
        Fail,
        Panic,
    }

    struct TestAgent {
        id: &'static str,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl TestAgent {
        fn new(id: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ResearchAgent for TestAgent {
        fn id(&self) -> &str {
            self.id
        }

        fn description(&self) -> &str {
            "test agent"
        }

        async fn invoke(&self, task: &str, _: Instant) -> Result<AgentOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Items(n) => Ok(AgentOutput {
                    operations: vec![format!("lookup: {}", task)],
                    results: (0..n)
                        .map(|i| RawItem::new().with("url", format!("https://{}/{}", self.id, i)))
                        .collect(),
                }),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    Ok(AgentOutput::default())
                }
                Behavior::Fail => Err(AppError::Agent("search backend returned 500".to_string())),
                Behavior::Panic => panic!("agent crashed"),
            }
        }
    }

    fn step(agent: &str) -> PlanStep {
        PlanStep {
            agent: AgentId::from(agent),
            task: "transformers vs rnn".to_string(),
            priority: 3,
        }
    }

    fn executor(agents: Vec<Arc<TestAgent>>) -> AgentExecutor {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(agent);
        }
        AgentExecutor::new(Arc::new(registry), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_every_slot() {
        let ok = TestAgent::new("ok", Behavior::Items(3));
        let slow = TestAgent::new("slow", Behavior::Sleep(Duration::from_secs(5)));
        let broken = TestAgent::new("broken", Behavior::Fail);
        let executor = executor(vec![ok, slow, broken]);

        let plan = Plan::new(vec![step("slow"), step("ok"), step("broken")]);
        let results = executor.execute(&plan).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, AgentStatus::TimedOut);
        assert_eq!(results[1].status, AgentStatus::Ok);
        assert_eq!(results[1].results.len(), 3);
        assert_eq!(results[2].status, AgentStatus::Failed);
        assert!(results[2].error.as_deref().unwrap().contains("500"));
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.step_index, i);
        }
    }

    #[tokio::test]
    async fn test_unknown_agent_is_never_invoked() {
        let ok = TestAgent::new("ok", Behavior::Items(1));
        let executor = executor(vec![ok.clone()]);

        let plan = Plan::new(vec![step("ghost"), step("ok")]);
        let results = executor.execute(&plan).await;

        assert_eq!(results[0].status, AgentStatus::Failed);
        assert!(results[0].error.as_deref().unwrap().contains("unknown agent"));
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_agent_becomes_failed() {
        let crash = TestAgent::new("crash", Behavior::Panic);
        let ok = TestAgent::new("ok", Behavior::Items(2));
        let results = executor(vec![crash, ok])
            .execute(&Plan::new(vec![step("crash"), step("ok")]))
            .await;

        assert_eq!(results[0].status, AgentStatus::Failed);
        assert_eq!(results[1].status, AgentStatus::Ok);
    }

    #[tokio::test]
    async fn test_per_agent_timeout_override() {
        let slow = TestAgent::new("slow", Behavior::Sleep(Duration::from_millis(300)));
        let executor = executor(vec![slow])
            .with_timeout(AgentId::from("slow"), Duration::from_secs(2));

        let results = executor.execute(&Plan::new(vec![step("slow")])).await;
        assert_eq!(results[0].status, AgentStatus::Ok);
    }

    #[test]
    fn test_execution_summary_counts_successes_only() {
        let ok_step = step("ok");
        let failed_step = step("broken");
        let results = vec![
            AgentResult::completed(
                0,
                &ok_step,
                vec!["q1".to_string()],
                vec![RawItem::new(), RawItem::new(), RawItem::new()],
                12,
            ),
            AgentResult::failed(1, &failed_step, AgentStatus::TimedOut, "timed out", 200),
        ];

        match execution_summary(&results) {
            StepDetail::ExecutionCompleted {
                result_count,
                operations,
                agents,
            } => {
                assert_eq!(result_count, 3);
                assert_eq!(operations[&AgentId::from("ok")], vec!["q1".to_string()]);
                assert!(operations[&AgentId::from("broken")].is_empty());
                assert_eq!(agents.len(), 2);
                assert_eq!(agents[1].status, AgentStatus::TimedOut);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }
}
