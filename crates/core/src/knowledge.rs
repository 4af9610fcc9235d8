//! Knowledge base and community signal types.
//!
//! Both are read-only inputs to the context assembler. Knowledge documents
//! are curated articles injected into the generation prompt (the RAG
//! layer); community posts are a light social signal used for inference
//! only — never quoted back to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A curated knowledge base document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    /// Unique document ID
    pub id: String,

    /// Document title
    pub title: String,

    /// Short summary shown alongside the content
    pub summary: String,

    /// Full document body
    pub content: String,

    /// Only active documents are eligible for prompt injection
    pub active: bool,

    /// Creation timestamp — recency ordering for retrieval
    pub created_at: DateTime<Utc>,
}

impl KnowledgeDocument {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            summary: summary.into(),
            content: content.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// A community post authored by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityPost {
    /// Unique post ID
    pub id: String,

    /// The authoring user
    pub user_id: String,

    /// Post text
    pub content: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CommunityPost {
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_is_active() {
        let doc = KnowledgeDocument::new("Respiração", "Técnicas de respiração", "Conteúdo...");
        assert!(doc.active);
        assert!(!doc.id.is_empty());
    }

    #[test]
    fn community_post_carries_author() {
        let post = CommunityPost::new("u1", "Hoje consegui meditar por 10 minutos!");
        assert_eq!(post.user_id, "u1");
        assert!(post.content.contains("meditar"));
    }
}
