//! Property-based tests for the pure pipeline stages.
//!
//! Properties:
//! - Merge yields unique URLs, only from successful steps, independent of completion order
//! - Ranked and fallback recommendations stay within bounds and sorted
//! - Parsed plans only name registered agents and respect the step limit

mod common;

use common::mocks::{MockAgent, ScriptedLLM};
use proptest::prelude::*;
use scholar::research::merge::merge;
use scholar::research::planner::{MAX_PRIORITY, MIN_PRIORITY, Planner, parse_priority};
use scholar::research::recommendations::{MAX_RECOMMENDATIONS, fallback_recommendations, rank};
use scholar::research::router::IntentRouter;
use scholar::types::{
    AgentId, AgentResult, AgentStatus, PlanStep, RawItem, Recommendation, RecommendationType,
};
use std::collections::HashSet;

// ============================================================================
// STRATEGIES
// ============================================================================

/// URLs drawn from a small pool so duplicates are common.
fn arb_item() -> impl Strategy<Value = RawItem> {
    (0usize..8, "[a-z]{1,12}", any::<bool>()).prop_map(|(n, title, use_link)| {
        let key = if use_link { "link" } else { "url" };
        RawItem::new()
            .with(key, format!("https://example.com/{}", n))
            .with("title", title)
    })
}

/// Step results with indices 0..n in shuffled completion order.
fn arb_results() -> impl Strategy<Value = Vec<AgentResult>> {
    prop::collection::vec(
        (prop::collection::vec(arb_item(), 0..6), prop::bool::weighted(0.7)),
        1..6,
    )
    .prop_map(|steps| {
        steps
            .into_iter()
            .enumerate()
            .map(|(index, (items, ok))| {
                let step = PlanStep {
                    agent: AgentId::new(format!("agent_{}", index)),
                    task: "task".to_string(),
                    priority: 3,
                };
                if ok {
                    AgentResult::completed(index, &step, Vec::new(), items, 1)
                } else {
                    AgentResult::failed(index, &step, AgentStatus::TimedOut, "deadline", 1)
                }
            })
            .collect::<Vec<_>>()
    })
    .prop_shuffle()
}

fn arb_recommendation() -> impl Strategy<Value = Recommendation> {
    ("[A-Za-z ]{1,20}", 0.0f32..=1.0).prop_map(|(title, score)| Recommendation {
        title,
        description: "desc".to_string(),
        kind: RecommendationType::Topic,
        relevance_score: score,
    })
}

// ============================================================================
// MERGE
// ============================================================================

proptest! {
    #[test]
    fn prop_merge_urls_are_unique(results in arb_results()) {
        let sources = merge(&results);
        let urls: HashSet<&str> = sources.iter().map(|s| s.url.as_str()).collect();
        prop_assert_eq!(urls.len(), sources.len());
    }

    #[test]
    fn prop_merge_only_uses_successful_steps(results in arb_results()) {
        let expected: HashSet<String> = results
            .iter()
            .filter(|r| r.is_ok())
            .flat_map(|r| r.results.iter())
            .filter_map(|item| item.first_str(&["url", "link"]).map(str::to_string))
            .collect();
        let merged: HashSet<String> = merge(&results).into_iter().map(|s| s.url).collect();
        prop_assert_eq!(merged, expected);
    }

    #[test]
    fn prop_merge_ignores_completion_order(results in arb_results()) {
        let mut reversed = results.clone();
        reversed.reverse();
        prop_assert_eq!(merge(&results), merge(&reversed));
    }
}

// ============================================================================
// RECOMMENDATIONS
// ============================================================================

proptest! {
    #[test]
    fn prop_rank_is_bounded_sorted_and_idempotent(
        items in prop::collection::vec(arb_recommendation(), 0..12)
    ) {
        let ranked = rank(items.clone());
        prop_assert_eq!(ranked.len(), items.len().min(MAX_RECOMMENDATIONS));
        prop_assert!(ranked
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
        prop_assert_eq!(rank(ranked.clone()), ranked);
    }

    #[test]
    fn prop_fallback_always_suggests_something(message in ".{0,200}") {
        let items = fallback_recommendations(&message);
        prop_assert!(!items.is_empty());
        prop_assert!(items.len() <= MAX_RECOMMENDATIONS);
        prop_assert!(items
            .iter()
            .all(|r| (0.0..=1.0).contains(&r.relevance_score) && !r.title.is_empty()));
    }
}

// ============================================================================
// ROUTING AND PLANNING
// ============================================================================

proptest! {
    #[test]
    fn prop_classifier_output_never_panics(output in ".{0,300}") {
        let _ = IntentRouter::parse_classification(&output);
    }

    #[test]
    fn prop_long_messages_are_never_greetings(
        words in prop::collection::vec("[a-z]{2,8}", 5..12)
    ) {
        let message = format!("hello {}", words.join(" "));
        prop_assert!(IntentRouter::quick_check(&message).is_none());
    }

    #[test]
    fn prop_priority_is_clamped(value in any::<f64>()) {
        let json = serde_json::Number::from_f64(value).map(serde_json::Value::Number);
        let priority = parse_priority(json.as_ref());
        prop_assert!((MIN_PRIORITY..=MAX_PRIORITY).contains(&priority));
    }

    #[test]
    fn prop_parsed_plans_name_registered_agents(
        steps in prop::collection::vec(
            (prop_oneof![
                Just("web_search"),
                Just("academic_search"),
                Just("crystal_ball"),
            ], 0i64..10),
            0..8,
        )
    ) {
        let agents = common::registry(&[
            MockAgent::returning("web_search", vec![]),
            MockAgent::returning("academic_search", vec![]),
        ]);
        let planner = Planner::new(
            ScriptedLLM::fixed("unused"),
            agents.clone(),
            AgentId::from("web_search"),
            3,
            5,
        );
        let output = serde_json::json!({
            "steps": steps
                .iter()
                .map(|(agent, priority)| serde_json::json!({
                    "agent": agent,
                    "task": "look it up",
                    "priority": priority,
                }))
                .collect::<Vec<_>>()
        })
        .to_string();

        let plan = planner.parse_plan(&output, "the question");
        let known = steps.iter().filter(|(agent, _)| *agent != "crystal_ball").count();
        prop_assert_eq!(plan.len(), known.min(3));
        prop_assert!(plan.steps.iter().all(|s| agents.contains(&s.agent)));
        prop_assert!(plan.steps.windows(2).all(|w| w[0].priority >= w[1].priority));
    }
}
