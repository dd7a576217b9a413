//! Research Turn Pipeline
//!
//! This module runs a user's message through a fixed sequence of steps and
//! keeps every step observable while it runs.
//!
//! # Architecture
//!
//! The pipeline uses a coordinator pattern:
//! - [`coordinator::ResearchCoordinator`] - Owns one turn from message to stored answer
//! - [`router::IntentRouter`] - Picks the conversational shortcut or the research path
//! - [`planner::Planner`] and [`executor::AgentExecutor`] - Choose agents and fan out to them
//! - [`merge`] and [`synthesis::SynthesisEngine`] - Turn raw items into cited sources and an answer
//! - [`progress::ProgressTracker`] - Records each finished step for pollers
//!
//! # Usage
//!
//! ```ignore
//! use scholar::research::ResearchCoordinator;
//!
//! let coordinator = ResearchCoordinator::from_config(&config, store).await?;
//!
//! let handle = coordinator.register_turn();
//! let response = coordinator
//!     .process_tracked(handle, "Compare transformer and RNN architectures", None)
//!     .await?;
//!
//! println!("{}", response.answer);
//! for source in response.sources {
//!     println!("- {}", source.url);
//! }
//! ```
//!
//! # Turn Workflow
//!
//! 1. **Intent Analysis** - Classify the message once
//! 2. **Planning** - Pick agents and tasks, or the default web search
//! 3. **Execution** - Run every step concurrently with its own deadline
//! 4. **Merge** - Normalize and dedup sources in plan order
//! 5. **Synthesis** - Write the answer from sources and history
//! 6. **Recommendations** - Suggest follow-up topics

/// Direct replies for greetings, capability questions and follow-ups.
pub mod conversation;
/// Turn orchestration and the `process` / `get_status` entry points.
pub mod coordinator;
/// Concurrent plan execution with per-step deadlines.
pub mod executor;
/// Source normalization and dedup.
pub mod merge;
/// Agent task planning.
pub mod planner;
/// Step-by-step processing status.
pub mod progress;
/// Follow-up topic suggestions.
pub mod recommendations;
/// Intent classification and routing.
pub mod router;
/// Answer synthesis.
pub mod synthesis;

pub use coordinator::{PipelineModels, ResearchCoordinator, TurnMetadata, TurnResponse};
pub use progress::{ProcessingStatus, StatusHandle, StepDetail, StepName, TurnOutcome};
pub use router::{Route, RouteKind};
