//! LLM Provider Clients and Abstractions
//!
//! Every pipeline phase (routing, planning, conversation, synthesis,
//! recommendations) talks to a model through the [`LLMClient`] trait, so each
//! phase can be pointed at a different configured model.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use scholar::llm::ProviderRegistry;
//!
//! let registry = ProviderRegistry::from_config(&config);
//! let client = registry.create_client_for_model("default").await?;
//! let answer = client.generate("What is 2+2?").await?;
//! ```

/// Core LLM client trait, completion options and provider selection.
pub mod client;
/// Registry for named providers and models.
pub mod provider_registry;
/// JSON recovery from free-form model output.
pub mod structured;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{CompletionOptions, LLMClient, ModelParams, Provider, ResponseFormat};
pub use provider_registry::ProviderRegistry;
pub use structured::extract_json;
