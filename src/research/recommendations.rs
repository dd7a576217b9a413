//! Follow-up topic suggestions
//!
//! One structured generation call per turn. Anything unusable falls back to
//! suggestions built from the message's own words, so `recommend` always
//! yields between one and [`MAX_RECOMMENDATIONS`] items.

use crate::llm::{CompletionOptions, LLMClient, extract_json};
use crate::memory::{format_history_for_prompt, truncate_history};
use crate::types::{ChatMessage, Recommendation, RecommendationType, Turn};
use serde_json::Value;
use std::sync::Arc;

pub const MAX_RECOMMENDATIONS: usize = 5;
pub const DEFAULT_RELEVANCE: f32 = 0.7;
pub const DEFAULT_DESCRIPTION: &str = "An interesting topic related to your conversation.";

/// Turns of history shown to the model.
const CONTEXT_TURNS: usize = 3;
const MAX_FALLBACK_TERMS: usize = 3;
const MIN_TERM_CHARS: usize = 4;

const STOP_WORDS: &[&str] = &[
    "what", "when", "where", "which", "who", "whom", "whose", "why", "how", "about", "from",
    "into", "after", "with", "this", "that", "these", "those",
];

const FALLBACK_TYPES: [RecommendationType; 3] = [
    RecommendationType::Topic,
    RecommendationType::Concept,
    RecommendationType::ResearchArea,
];

/// Ranked suggestions and whether they came from the fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSet {
    pub items: Vec<Recommendation>,
    pub fallback: bool,
}

pub struct RecommendationGenerator {
    llm: Arc<dyn LLMClient>,
}

impl RecommendationGenerator {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    pub async fn recommend(&self, message: &str, history: &[Turn]) -> Vec<Recommendation> {
        self.generate(message, history).await.items
    }

    /// Never fails; see the module docs.
    pub async fn generate(&self, message: &str, history: &[Turn]) -> RecommendationSet {
        let context = format_history_for_prompt(truncate_history(history, CONTEXT_TURNS));
        let messages = vec![
            ChatMessage::system(Self::system_prompt(message)),
            ChatMessage::user(format!(
                "Conversation context:\n{}\n\nGenerate recommendations:",
                context
            )),
        ];

        let parsed = match self
            .llm
            .complete(&messages, &CompletionOptions::structured())
            .await
        {
            Ok(output) => parse_recommendations(&output),
            Err(e) => {
                tracing::warn!("Recommendation generation failed: {}", e);
                Vec::new()
            }
        };

        if parsed.is_empty() {
            tracing::warn!("Using fallback recommendations");
            return RecommendationSet {
                items: fallback_recommendations(message),
                fallback: true,
            };
        }

        RecommendationSet {
            items: rank(parsed),
            fallback: false,
        }
    }

    fn system_prompt(message: &str) -> String {
        format!(
            r#"Based on the user's message and the conversation history, suggest 3-5 related topics that might interest them for further research.

User message: {message}

Return a JSON array of recommendations, where each includes:
1. title: a clear, concise title
2. description: why this might be interesting (1-2 sentences)
3. type: either "topic", "concept", or "research_area"
4. relevance_score: a number between 0 and 1

Format as a clean JSON array only, no markdown or explanation."#
        )
    }
}

/// Parse model output into recommendations. Items without a title are skipped.
pub fn parse_recommendations(output: &str) -> Vec<Recommendation> {
    let items = match extract_json(output) {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut fields)) => match fields.remove("recommendations") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items.iter().filter_map(parse_item).collect()
}

fn parse_item(item: &Value) -> Option<Recommendation> {
    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let title = text("title")?;
    let relevance_score = match item.get("relevance_score") {
        Some(Value::Number(n)) => n.as_f64().map(|v| v as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
    .unwrap_or(DEFAULT_RELEVANCE)
    .clamp(0.0, 1.0);

    Some(Recommendation {
        title: title.to_string(),
        description: text("description").unwrap_or(DEFAULT_DESCRIPTION).to_string(),
        kind: text("type")
            .map(RecommendationType::from_label)
            .unwrap_or(RecommendationType::Topic),
        relevance_score,
    })
}

/// Sort by relevance, highest first, and keep the top [`MAX_RECOMMENDATIONS`].
///
/// The sort is stable so ranking an already ranked list changes nothing.
pub fn rank(mut items: Vec<Recommendation>) -> Vec<Recommendation> {
    items.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    items.truncate(MAX_RECOMMENDATIONS);
    items
}

/// Suggestions derived from the message alone.
pub fn fallback_recommendations(message: &str) -> Vec<Recommendation> {
    let mut terms: Vec<String> = message
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() >= MIN_TERM_CHARS && !STOP_WORDS.contains(&word.as_str()))
        .take(MAX_FALLBACK_TERMS)
        .collect();
    if terms.is_empty() {
        terms = vec!["research".to_string(), "help".to_string()];
    }

    let mut items: Vec<Recommendation> = terms
        .iter()
        .enumerate()
        .map(|(i, term)| Recommendation {
            title: format!("Research about {}", term),
            description: format!(
                "Explore academic resources and information related to {}.",
                term
            ),
            kind: FALLBACK_TYPES[i % FALLBACK_TYPES.len()],
            relevance_score: 0.8 - i as f32 * 0.1,
        })
        .collect();

    items.push(Recommendation {
        title: "Trending research topics".to_string(),
        description: "Discover current trends in academic research.".to_string(),
        kind: RecommendationType::Topic,
        relevance_score: 0.6,
    });

    rank(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppError, Result};
    use async_trait::async_trait;

    struct FixedLLM(std::result::Result<String, String>);

    #[async_trait]
    impl LLMClient for FixedLLM {
        async fn complete(&self, _: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
            self.0.clone().map_err(AppError::LLM)
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn generator(output: std::result::Result<&str, &str>) -> RecommendationGenerator {
        RecommendationGenerator::new(Arc::new(FixedLLM(
            output.map(str::to_string).map_err(str::to_string),
        )))
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let items = parse_recommendations(r#"[{"title": "Attention mechanisms"}]"#);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, DEFAULT_DESCRIPTION);
        assert_eq!(items[0].kind, RecommendationType::Topic);
        assert_eq!(items[0].relevance_score, DEFAULT_RELEVANCE);
    }

    #[test]
    fn test_parse_wrapped_object_and_clamps() {
        let items = parse_recommendations(
            r#"```json
{"recommendations": [
  {"title": "Seq2seq", "type": "concept", "relevance_score": 1.7},
  {"title": "BLEU", "type": "paper", "relevance_score": "-0.2"},
  {"description": "no title"}
]}
```"#,
        );
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].relevance_score, 1.0);
        assert_eq!(items[0].kind, RecommendationType::Concept);
        assert_eq!(items[1].relevance_score, 0.0);
        assert_eq!(items[1].kind, RecommendationType::Topic);
    }

    #[test]
    fn test_parse_rejects_non_list() {
        assert!(parse_recommendations("sorry, I cannot help").is_empty());
        assert!(parse_recommendations(r#"{"title": "x"}"#).is_empty());
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let items: Vec<Recommendation> = (0..8)
            .map(|i| Recommendation {
                title: format!("t{}", i),
                description: String::new(),
                kind: RecommendationType::Topic,
                relevance_score: (i as f32) / 10.0,
            })
            .collect();
        let ranked = rank(items);
        assert_eq!(ranked.len(), MAX_RECOMMENDATIONS);
        assert_eq!(ranked[0].title, "t7");
        assert_eq!(rank(ranked.clone()), ranked);
    }

    #[test]
    fn test_fallback_terms() {
        let items = fallback_recommendations("What about transformer architectures, for translation?");
        let titles: Vec<&str> = items.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Research about transformer",
                "Research about architectures",
                "Research about translation",
                "Trending research topics",
            ]
        );
        assert_eq!(items[1].kind, RecommendationType::Concept);
        assert_eq!(items[2].kind, RecommendationType::ResearchArea);
    }

    #[test]
    fn test_fallback_without_terms() {
        let items = fallback_recommendations("hi");
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].title, "Research about research");
        assert_eq!(items[2].title, "Trending research topics");
    }

    #[tokio::test]
    async fn test_generate_from_model() {
        let set = generator(Ok(
            r#"[{"title": "A", "relevance_score": 0.2}, {"title": "B", "relevance_score": 0.9}]"#,
        ))
        .generate("anything", &[])
        .await;
        assert!(!set.fallback);
        assert_eq!(set.items[0].title, "B");
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_error() {
        let set = generator(Err("down")).generate("neural machine translation", &[]).await;
        assert!(set.fallback);
        assert!(!set.items.is_empty());
        assert!(set.items.len() <= MAX_RECOMMENDATIONS);
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_empty_list() {
        let items = generator(Ok("[]")).recommend("hello", &[]).await;
        assert!(!items.is_empty());
    }
}
