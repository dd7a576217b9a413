//! Conversation persistence.
//!
//! - [`InMemoryStore`]: process-local, the default
//! - [`JsonlStore`]: append-only JSON lines file

pub mod jsonl;
pub mod memory;
pub mod traits;

pub use jsonl::JsonlStore;
pub use memory::InMemoryStore;
pub use traits::{ConversationStore, StoreProvider};
