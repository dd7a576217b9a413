//! # Scholar - a multi-agent research assistant engine
//!
//! Scholar answers research questions by classifying the user's intent,
//! planning searches across research agents, running them concurrently,
//! merging what they find into cited sources and writing an answer with
//! follow-up suggestions. Every turn reports its progress step by step.
//!
//! ## Overview
//!
//! Scholar can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `scholar` binary
//! 2. **As a library** - Embed [`ResearchCoordinator`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use scholar::{ResearchCoordinator, ScholarConfigManager};
//! use scholar::db::StoreProvider;
//!
//! #[tokio::main]
//! async fn main() -> scholar::Result<()> {
//!     let manager = ScholarConfigManager::new("scholar.toml")?;
//!     let config = manager.config();
//!
//!     let store = StoreProvider::from_path(config.store.path.as_deref())
//!         .create_store()
//!         .await?;
//!     let coordinator = ResearchCoordinator::from_config(&config, store).await?;
//!
//!     let response = coordinator.process("What is retrieval augmented generation?", None).await?;
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```
//!
//! ### Polling Progress
//!
//! ```rust,ignore
//! let handle = coordinator.register_turn();
//! let turn = coordinator.process_tracked(handle, message, Some(conversation_id));
//!
//! // From another task, or between polls of `turn`:
//! if let Some(status) = coordinator.get_status(handle) {
//!     println!("{}% {:?}", status.progress_percent, status.current_step);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API and compatible endpoints |
//!
//! ## Modules
//!
//! - [`agents`] - Research agents (web and academic search) and their registry
//! - [`db`] - Conversation storage (in memory, JSON lines)
//! - [`llm`] - LLM client implementations
//! - [`memory`] - History windows and prompt formatting
//! - [`research`] - The turn pipeline
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and logging
//!
//! ## Configuration
//!
//! A single TOML file (`scholar.toml`) names providers and models, assigns a
//! model to each pipeline phase, tunes limits and timeouts, enables agents and
//! selects the conversation store. It can be reloaded without restarting.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Research agents and their registry.
pub mod agents;
/// Conversation persistence.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Conversation history windows and prompt formatting.
pub mod memory;
/// Multi-agent research pipeline.
pub mod research;
/// Core types (intents, plans, sources, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;

// Re-export commonly used types
pub use agents::AgentRegistry;
pub use llm::{LLMClient, Provider, ProviderRegistry};
pub use research::{ResearchCoordinator, TurnResponse};
pub use types::{AppError, Result};
pub use utils::toml_config::{ScholarConfig, ScholarConfigManager};
