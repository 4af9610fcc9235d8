//! In-memory backend — useful for testing and ephemeral sessions.
//!
//! All collections live behind a single `RwLock`, so `consume_interaction`
//! runs its reset-check and decrement inside one write-lock section,
//! satisfying the atomicity contract of `ProfileStore`.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use clara_core::error::StoreError;
use clara_core::knowledge::{CommunityPost, KnowledgeDocument};
use clara_core::message::{Conversation, ConversationId, StoredMessage};
use clara_core::profile::UserProfile;
use clara_core::store::{
    CommunityStore, ConversationStore, KnowledgeStore, ProfileStore, QuotaConsume,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    profiles: HashMap<String, UserProfile>,
    conversations: HashMap<String, Conversation>,
    /// conversation id → messages in insertion order
    messages: HashMap<String, Vec<StoredMessage>>,
    documents: Vec<KnowledgeDocument>,
    posts: Vec<CommunityPost>,
}

/// An in-memory store keeping everything in maps and vecs.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
        }
    }

    /// Seed a knowledge document (test/setup helper).
    pub async fn add_document(&self, document: KnowledgeDocument) {
        self.inner.write().await.documents.push(document);
    }

    /// Seed a community post (test/setup helper).
    pub async fn add_post(&self, post: CommunityPost) {
        self.inner.write().await.posts.push(post);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.inner.read().await.profiles.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn consume_interaction(
        &self,
        user_id: &str,
        today: NaiveDate,
        ceiling: i64,
        enforce_limit: bool,
    ) -> Result<Option<QuotaConsume>, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(profile) = inner.profiles.get_mut(user_id) else {
            return Ok(None);
        };

        // Lazy daily rollover — first interaction of the day resets the counter
        if profile.last_interaction_date != Some(today) {
            profile.daily_interactions = ceiling;
            profile.last_interaction_date = Some(today);
        }

        if enforce_limit && profile.daily_interactions <= 0 {
            return Ok(Some(QuotaConsume {
                allowed: false,
                remaining: profile.daily_interactions.max(0),
            }));
        }

        // The counter never drops below zero, even unenforced
        profile.daily_interactions = (profile.daily_interactions - 1).max(0);
        profile.last_interaction_date = Some(today);

        Ok(Some(QuotaConsume {
            allowed: true,
            remaining: profile.daily_interactions,
        }))
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self.inner.read().await.conversations.get(&id.0).cloned())
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.conversations.contains_key(&conversation.id.0) {
            return Err(StoreError::Conflict(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        inner
            .conversations
            .insert(conversation.id.0.clone(), conversation);
        Ok(())
    }

    async fn append_message(&self, message: StoredMessage) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let conv_id = message.conversation_id.0.clone();
        if !inner.conversations.contains_key(&conv_id) {
            return Err(StoreError::NotFound(format!("conversation {conv_id}")));
        }
        inner.messages.entry(conv_id.clone()).or_default().push(message);
        if let Some(conv) = inner.conversations.get_mut(&conv_id) {
            conv.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.read().await;
        let Some(messages) = inner.messages.get(&conversation_id.0) else {
            return Ok(Vec::new());
        };
        // Insertion order == created_at order for appends; take the tail.
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn active_documents(&self, limit: usize) -> Result<Vec<KnowledgeDocument>, StoreError> {
        let inner = self.inner.read().await;
        let mut docs: Vec<KnowledgeDocument> = inner
            .documents
            .iter()
            .filter(|d| d.active)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        docs.truncate(limit);
        Ok(docs)
    }
}

#[async_trait]
impl CommunityStore for InMemoryStore {
    async fn recent_posts_by(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<CommunityPost>, StoreError> {
        let inner = self.inner.read().await;
        let mut posts: Vec<CommunityPost> = inner
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit);
        Ok(posts)
    }
}
