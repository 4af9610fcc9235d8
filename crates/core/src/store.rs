//! Data store traits — the persistence boundary for the pipeline.
//!
//! The pipeline never talks to a database directly; it goes through these
//! traits so backends (in-memory for tests, SQLite for production) can be
//! swapped via configuration.
//!
//! `consume_interaction` is deliberately a single atomic operation rather
//! than a read-then-write pair: concurrent turns for the same user must
//! not both observe the same pre-decrement counter value. Backends run the
//! reset-check and decrement under their own exclusion (a mutex section in
//! memory, a transaction in SQLite).

use crate::error::StoreError;
use crate::knowledge::{CommunityPost, KnowledgeDocument};
use crate::message::{Conversation, ConversationId, StoredMessage};
use crate::profile::UserProfile;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Outcome of an atomic quota consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaConsume {
    /// Whether the interaction was granted (and the counter decremented)
    pub allowed: bool,

    /// Interactions remaining today after this attempt
    pub remaining: i64,
}

/// User profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile by user ID.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Insert or replace a profile.
    async fn upsert_profile(&self, profile: UserProfile) -> Result<(), StoreError>;

    /// Atomically consume one daily interaction for `user_id`.
    ///
    /// In a single exclusive section the backend must:
    /// 1. If `last_interaction_date != today` (or unset): reset the counter
    ///    to `ceiling` and stamp `today`.
    /// 2. If the counter is `<= 0` and `enforce_limit` is true: return
    ///    `allowed = false` without decrementing further.
    /// 3. Otherwise: decrement by one, flooring at zero, and return
    ///    `allowed = true`. The counter never goes negative.
    ///
    /// Returns `None` when no profile exists — the caller treats that as
    /// "no quota tracked".
    async fn consume_interaction(
        &self,
        user_id: &str,
        today: NaiveDate,
        ceiling: i64,
        enforce_limit: bool,
    ) -> Result<Option<QuotaConsume>, StoreError>;
}

/// Conversation and message persistence. Messages are append-only.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch a conversation record by ID.
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Create a new conversation record.
    async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError>;

    /// Append a message. The conversation's `updated_at` is bumped.
    async fn append_message(&self, message: StoredMessage) -> Result<(), StoreError>;

    /// The most recent `limit` messages of a conversation, in ascending
    /// `created_at` order (insertion order breaks ties).
    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}

/// Knowledge base retrieval.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Up to `limit` documents with `active == true`, newest first.
    async fn active_documents(&self, limit: usize) -> Result<Vec<KnowledgeDocument>, StoreError>;
}

/// Community signal retrieval.
#[async_trait]
pub trait CommunityStore: Send + Sync {
    /// Up to `limit` most recent posts authored by `user_id`, newest first.
    async fn recent_posts_by(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<CommunityPost>, StoreError>;
}

/// The full persistence surface the pipeline depends on.
///
/// Blanket-implemented for any type providing all four stores, so backends
/// only implement the individual traits.
pub trait DataStore: ProfileStore + ConversationStore + KnowledgeStore + CommunityStore {}

impl<T> DataStore for T where T: ProfileStore + ConversationStore + KnowledgeStore + CommunityStore {}
