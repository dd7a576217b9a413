//! Research planning
//!
//! Asks the planning model which agents to run and with which task, then
//! validates the answer against the [`AgentRegistry`]. The planner never fails:
//! unusable output becomes the single-step default plan.

use crate::agents::AgentRegistry;
use crate::llm::{CompletionOptions, LLMClient, extract_json};
use crate::memory::{format_history_for_prompt, truncate_history};
use crate::types::{AgentId, ChatMessage, IntentAnalysis, Plan, PlanStep, Turn};
use serde_json::Value;
use std::sync::Arc;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;
pub const DEFAULT_PRIORITY: u8 = 3;

pub struct Planner {
    llm: Arc<dyn LLMClient>,
    agents: Arc<AgentRegistry>,
    default_agent: AgentId,
    max_steps: usize,
    history_window: usize,
}

impl Planner {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        agents: Arc<AgentRegistry>,
        default_agent: AgentId,
        max_steps: usize,
        history_window: usize,
    ) -> Self {
        Self {
            llm,
            agents,
            default_agent,
            max_steps: max_steps.max(1),
            history_window,
        }
    }

    pub async fn plan(&self, message: &str, intent: &IntentAnalysis, history: &[Turn]) -> Plan {
        let messages = vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(self.user_prompt(message, intent, history)),
        ];

        let output = match self
            .llm
            .complete(&messages, &CompletionOptions::structured().with_temperature(0.2))
            .await
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Planning failed, using default plan: {}", e);
                return self.default_plan(message);
            }
        };

        let plan = self.parse_plan(&output, message);
        if plan.is_empty() {
            tracing::warn!("Planner returned no usable steps, using default plan");
            tracing::debug!("Planner output: {}", output);
            return self.default_plan(message);
        }

        tracing::info!(steps = plan.len(), "Research plan generated");
        plan
    }

    /// One step on the default agent with the raw message as its task.
    pub fn default_plan(&self, message: &str) -> Plan {
        Plan {
            steps: vec![PlanStep {
                agent: self.default_agent.clone(),
                task: message.trim().to_string(),
                priority: MAX_PRIORITY,
            }],
            fallback: true,
        }
    }

    /// Validate model output into a plan. Returns an empty plan when nothing survives.
    pub fn parse_plan(&self, output: &str, message: &str) -> Plan {
        let steps = match extract_json(output) {
            Some(Value::Array(steps)) => steps,
            Some(Value::Object(mut fields)) => {
                match ["steps", "plan", "tasks"]
                    .iter()
                    .find_map(|key| fields.remove(*key))
                {
                    Some(Value::Array(steps)) => steps,
                    _ => return Plan::default(),
                }
            }
            _ => return Plan::default(),
        };

        let mut valid: Vec<PlanStep> = steps
            .iter()
            .filter_map(|step| self.parse_step(step, message))
            .collect();

        // Stable: equal priorities keep the model's order.
        valid.sort_by(|a, b| b.priority.cmp(&a.priority));
        valid.truncate(self.max_steps);
        Plan::new(valid)
    }

    fn parse_step(&self, step: &Value, message: &str) -> Option<PlanStep> {
        let name = ["agent", "agent_id", "agent_type"]
            .iter()
            .find_map(|key| step.get(*key).and_then(Value::as_str))?;
        let Some(agent) = self.agents.resolve(name) else {
            tracing::warn!("Dropping plan step for unknown agent '{}'", name);
            return None;
        };

        let task = ["task", "query", "description"]
            .iter()
            .find_map(|key| step.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|task| !task.is_empty())
            .unwrap_or(message.trim());

        Some(PlanStep {
            agent,
            task: task.to_string(),
            priority: parse_priority(step.get("priority")),
        })
    }

    fn system_prompt(&self) -> String {
        let agents = self
            .agents
            .descriptors()
            .into_iter()
            .map(|(id, description)| format!("- {}: {}", id, description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You plan research for an assistant. Decide which agents to run and what each should search for.

Available agents:
{agents}

Rules:
- Use only the agents listed above.
- Give each step a focused search task, not the whole conversation.
- Use at most {max} steps.
- priority is 1 (low) to 5 (high).

Respond with JSON only:
{{"steps": [{{"agent": "<agent id>", "task": "<search task>", "priority": <1-5>}}]}}"#,
            max = self.max_steps,
        )
    }

    fn user_prompt(&self, message: &str, intent: &IntentAnalysis, history: &[Turn]) -> String {
        let recent = truncate_history(history, self.history_window);
        let mut prompt = String::new();
        if !recent.is_empty() {
            prompt.push_str("Conversation so far:\n");
            prompt.push_str(&format_history_for_prompt(recent));
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!(
            "Intent: {}\nQuestion: {}",
            intent.primary_intent, message
        ));
        prompt
    }
}

/// Integers are clamped to `1..=5`; `high` / `medium` / `low` map to 5 / 3 / 1.
pub fn parse_priority(value: Option<&Value>) -> u8 {
    let numeric = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "high" => Some(f64::from(MAX_PRIORITY)),
            "medium" | "normal" => Some(f64::from(DEFAULT_PRIORITY)),
            "low" => Some(f64::from(MIN_PRIORITY)),
            other => other.parse::<f64>().ok(),
        },
        _ => None,
    };

    match numeric {
        Some(n) if n.is_finite() => {
            n.round().clamp(f64::from(MIN_PRIORITY), f64::from(MAX_PRIORITY)) as u8
        }
        _ => DEFAULT_PRIORITY,
    }
}
