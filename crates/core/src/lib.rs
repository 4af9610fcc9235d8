//! # Clara Core
//!
//! Domain types, traits, and error definitions for the Clara chat assistant
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (data store, LLM provider) is defined as a
//! trait here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod knowledge;
pub mod message;
pub mod profile;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use knowledge::{CommunityPost, KnowledgeDocument};
pub use message::{Author, Conversation, ConversationId, StoredMessage};
pub use profile::{Plan, UserProfile};
pub use provider::{ChatProvider, ChatReply, ChatRequest, ChatTurn, TurnRole};
pub use store::{
    CommunityStore, ConversationStore, DataStore, KnowledgeStore, ProfileStore, QuotaConsume,
};
