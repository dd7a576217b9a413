//! LLM client abstraction and provider selection
//!
//! Every pipeline phase talks to a model through [`LLMClient`]. Providers:
//! - **Ollama**: local inference (feature `ollama`)
//! - **OpenAI**: OpenAI API and compatible endpoints (feature `openai`)

use crate::types::{AppError, ChatMessage, Result};
use crate::utils::toml_config::{ModelConfig, ProviderConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Shape the caller expects back from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free text.
    #[default]
    Text,
    /// A single JSON document. Backends that support a JSON mode enable it.
    Structured,
}

/// Per-request generation options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    pub response_format: ResponseFormat,
    /// Overrides the model default when set.
    pub temperature: Option<f32>,
    /// Overrides the model default when set.
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn text() -> Self {
        Self::default()
    }

    pub fn structured() -> Self {
        Self {
            response_format: ResponseFormat::Structured,
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Generic LLM client trait for provider abstraction
///
/// All providers implement [`complete`](LLMClient::complete); the prompt helpers
/// are built on top of it.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Run a chat completion over `messages`.
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String>;

    /// Generate a completion from a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)], &CompletionOptions::text())
            .await
    }

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(
            &[ChatMessage::system(system), ChatMessage::user(prompt)],
            &CompletionOptions::text(),
        )
        .await
    }

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Sampling defaults attached to a configured model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelParams {
    /// Request options win over model defaults.
    pub fn resolve(&self, options: &CompletionOptions) -> (Option<f32>, Option<u32>) {
        (
            options.temperature.or(self.temperature),
            options.max_tokens.or(self.max_tokens),
        )
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    ///     params: Default::default(),
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        params: ModelParams,
    },

    /// OpenAI API provider (including compatible APIs)
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: ModelParams,
    },
}

impl Provider {
    /// Resolve a configured model against its provider entry.
    ///
    /// OpenAI keys are read from the environment variable named by the provider.
    pub fn from_model_config(model: &ModelConfig, provider: &ProviderConfig) -> Result<Self> {
        let params = ModelParams {
            temperature: Some(model.temperature),
            max_tokens: Some(model.max_tokens),
        };

        match provider {
            ProviderConfig::Ollama { base_url, .. } => Ok(Provider::Ollama {
                base_url: base_url.clone(),
                model: model.model.clone(),
                params,
            }),
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
                ..
            } => {
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: api_base.clone(),
                    model: model.model.clone(),
                    params,
                })
            }
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the provider's feature is not compiled in.
    pub async fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                params,
            } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone(), *params).await?,
            )),

            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *params,
            ))),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} provider is not enabled in this build",
                other.name()
            ))),
        }
    }

    /// Check whether this build can create a client for the provider
    pub fn is_enabled(&self) -> bool {
        match self {
            Provider::Ollama { .. } => cfg!(feature = "ollama"),
            Provider::OpenAI { .. } => cfg!(feature = "openai"),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Ollama { .. } => "Ollama",
            Provider::OpenAI { .. } => "OpenAI",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::Ollama { model, .. } | Provider::OpenAI { model, .. } => model,
        }
    }
}
