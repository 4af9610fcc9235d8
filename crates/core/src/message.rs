//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the pipeline:
//! a user message arrives → the turn orchestrator processes it → exactly
//! one bot message is appended in response.
//!
//! Messages are immutable once created — the store only ever appends.
//! Within a conversation, `created_at` defines total order (ties broken
//! by insertion order).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The end user
    User,
    /// The assistant ("Dra. Clara")
    Bot,
}

impl Author {
    pub fn as_str(&self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Bot => "bot",
        }
    }
}

impl std::str::FromStr for Author {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Author::User),
            "bot" => Ok(Author::Bot),
            other => Err(format!("unknown author type: {other}")),
        }
    }
}

/// A single persisted message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Unique message ID
    pub id: String,

    /// Which conversation this message belongs to
    pub conversation_id: ConversationId,

    /// Who authored this message
    pub author: Author,

    /// The text content
    pub content: String,

    /// Creation timestamp — total order within the conversation
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// Create a new user message in the given conversation.
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            author: Author::User,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new bot message in the given conversation.
    pub fn bot(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            author: Author::Bot,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A conversation record — an ordered sequence of messages owned by
/// exactly one user (never shared, never reassigned).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// The owning user
    pub user_id: String,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was appended
    pub updated_at: DateTime<Utc>,

    /// Optional title (auto-generated or user-set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Conversation {
    /// Create a new empty conversation owned by `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            user_id: user_id.into(),
            created_at: now,
            updated_at: now,
            title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let conv = ConversationId::new();
        let msg = StoredMessage::user(conv.clone(), "Estou ansioso hoje");
        assert_eq!(msg.author, Author::User);
        assert_eq!(msg.content, "Estou ansioso hoje");
        assert_eq!(msg.conversation_id, conv);
    }

    #[test]
    fn conversation_has_single_owner() {
        let conv = Conversation::new("user-1");
        assert_eq!(conv.user_id, "user-1");
        assert!(conv.title.is_none());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = StoredMessage::bot(ConversationId::from("c1"), "Olá!");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"bot\""));
        let deserialized: StoredMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Olá!");
        assert_eq!(deserialized.author, Author::Bot);
    }

    #[test]
    fn author_parses_from_str() {
        assert_eq!("user".parse::<Author>().unwrap(), Author::User);
        assert_eq!("bot".parse::<Author>().unwrap(), Author::Bot);
        assert!("system".parse::<Author>().is_err());
    }
}
