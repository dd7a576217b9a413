//! Answer synthesis
//!
//! The last content-producing step, so failures here end the turn.

use crate::llm::{CompletionOptions, LLMClient};
use crate::memory::{estimate_tokens, format_history_for_prompt, truncate_chars, truncate_history};
use crate::types::{AppError, ChatMessage, Result, Source, SourceType, Turn};
use std::fmt::Write;
use std::sync::Arc;

/// Prefixed to answers written without any retrieved sources.
pub const NO_FINDINGS_NOTE: &str = "No fresh findings were retrieved for this question; \
this answer is based on the conversation so far.";

/// Characters of each source description shown to the model.
const MAX_DESCRIPTION_CHARS: usize = 300;

pub struct SynthesisEngine {
    llm: Arc<dyn LLMClient>,
    history_window: usize,
    max_sources: usize,
}

impl SynthesisEngine {
    pub fn new(llm: Arc<dyn LLMClient>, history_window: usize, max_sources: usize) -> Self {
        Self {
            llm,
            history_window,
            max_sources: max_sources.max(1),
        }
    }

    /// Write the answer for `message` from `sources` and recent history.
    ///
    /// With no sources the model answers from context alone and the answer
    /// starts with [`NO_FINDINGS_NOTE`].
    pub async fn synthesize(
        &self,
        message: &str,
        history: &[Turn],
        sources: &[Source],
    ) -> Result<String> {
        let prompt = self.build_prompt(message, history, sources);
        tracing::debug!(
            sources = sources.len().min(self.max_sources),
            prompt_tokens = estimate_tokens(&prompt),
            "Synthesizing answer"
        );

        let messages = vec![
            ChatMessage::system(Self::system_prompt(sources.is_empty())),
            ChatMessage::user(prompt),
        ];
        let answer = self
            .llm
            .complete(&messages, &CompletionOptions::text())
            .await
            .map_err(|e| AppError::Synthesis(e.to_string()))?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AppError::Synthesis("model returned an empty answer".to_string()));
        }

        if sources.is_empty() {
            Ok(format!("{}\n\n{}", NO_FINDINGS_NOTE, answer))
        } else {
            Ok(answer.to_string())
        }
    }

    fn system_prompt(no_sources: bool) -> &'static str {
        if no_sources {
            "You are a research assistant. No search results could be retrieved for this question. \
             Answer from the conversation and general knowledge, say clearly that no fresh sources \
             were found, and keep the answer well structured."
        } else {
            "You are a research assistant. Write a comprehensive, well-structured answer to the \
             user's question. Ground claims in the numbered sources where applicable and cite them \
             as [1], [2], ... Say so when the sources do not cover part of the question."
        }
    }

    fn build_prompt(&self, message: &str, history: &[Turn], sources: &[Source]) -> String {
        let mut prompt = String::new();

        let recent = truncate_history(history, self.history_window);
        if !recent.is_empty() {
            let _ = write!(
                prompt,
                "Conversation so far:\n{}\n\n",
                format_history_for_prompt(recent)
            );
        }

        let _ = writeln!(prompt, "Question: {}", message);

        if !sources.is_empty() {
            prompt.push_str("\nSources:\n");
            for (i, source) in sources.iter().take(self.max_sources).enumerate() {
                let kind = match source.source_type {
                    SourceType::Academic => "paper",
                    SourceType::Web => "web",
                };
                let _ = write!(prompt, "[{}] ({}) {}", i + 1, kind, source.title);
                if let Some(description) = &source.description {
                    let _ = write!(
                        prompt,
                        ": {}",
                        truncate_chars(description, MAX_DESCRIPTION_CHARS)
                    );
                }
                prompt.push('\n');
            }
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct RecordingLLM {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLMClient for RecordingLLM {
        async fn complete(&self, messages: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
            self.prompts.lock().push(
                messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
            );
            self.reply.clone().map_err(AppError::LLM)
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn engine(reply: std::result::Result<&str, &str>, max_sources: usize) -> (SynthesisEngine, Arc<RecordingLLM>) {
        let llm = Arc::new(RecordingLLM {
            reply: reply.map(str::to_string).map_err(str::to_string),
            prompts: Mutex::new(Vec::new()),
        });
        (SynthesisEngine::new(llm.clone(), 5, max_sources), llm)
    }

    fn source(n: usize) -> Source {
        Source {
            url: format!("https://example.com/{}", n),
            title: format!("Source {}", n),
            description: Some("x".repeat(500)),
            source_type: SourceType::Web,
            arxiv_id: None,
            authors: None,
        }
    }

    #[tokio::test]
    async fn test_prompt_caps_sources_and_descriptions() {
        let (engine, llm) = engine(Ok("Transformers parallelize better [1]."), 2);
        let sources: Vec<Source> = (1..=4).map(source).collect();
        let answer = engine
            .synthesize("Compare transformers and RNNs", &[], &sources)
            .await
            .unwrap();

        assert_eq!(answer, "Transformers parallelize better [1].");
        let prompt = llm.prompts.lock()[0].clone();
        assert!(prompt.contains("[2] (web) Source 2"));
        assert!(!prompt.contains("Source 3"));
        assert!(prompt.contains(&format!("{}...", "x".repeat(MAX_DESCRIPTION_CHARS))));
        assert!(!prompt.contains(&"x".repeat(MAX_DESCRIPTION_CHARS + 1)));
    }

    #[tokio::test]
    async fn test_no_sources_adds_note() {
        let (engine, _) = engine(Ok("From what we discussed, RNNs are sequential."), 10);
        let history = vec![Turn::user("c", "Tell me about RNNs")];
        let answer = engine
            .synthesize("Compare transformers and RNNs", &history, &[])
            .await
            .unwrap();
        assert!(answer.starts_with(NO_FINDINGS_NOTE));
        assert!(answer.ends_with("RNNs are sequential."));
    }

    #[tokio::test]
    async fn test_generation_failure_is_synthesis_error() {
        let (engine, _) = engine(Err("backend down"), 10);
        let err = engine.synthesize("q", &[], &[source(1)]).await.unwrap_err();
        assert!(matches!(err, AppError::Synthesis(ref m) if m.contains("backend down")));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_empty_answer_is_synthesis_error() {
        let (engine, _) = engine(Ok("\n  "), 10);
        assert!(matches!(
            engine.synthesize("q", &[], &[]).await,
            Err(AppError::Synthesis(_))
        ));
    }
}
