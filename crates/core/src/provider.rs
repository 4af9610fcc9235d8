//! ChatProvider trait — the abstraction over LLM backends.
//!
//! A ChatProvider knows how to send a system prompt, an optional seeded
//! history, and a current message to an LLM and get a single reply back.
//!
//! Implementations: Gemini (primary), OpenAI-compatible (fallback).
//!
//! Response extraction is validated: a provider must return non-empty
//! reply text or an error. Missing expected fields in the wire response
//! are a provider failure, never a silent empty string.

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The role of a prior turn passed to a provider as seeded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The end user
    User,
    /// The model's earlier replies
    Model,
}

/// A single prior conversation turn, chronological order preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A request for a single chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "gemini-1.5-flash", "gpt-4o-mini")
    pub model: String,

    /// System instructions (persona + injected context), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Prior turns seeding the chat session. Empty for context-free calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChatTurn>,

    /// The current user message
    pub message: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    /// A minimal request with just a model and message.
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            history: Vec::new(),
            message: message.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// A validated reply from a provider. `text` is guaranteed non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// The generated reply text (non-empty)
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// The core ChatProvider trait.
///
/// Every LLM backend implements this trait. The generation client calls
/// `generate()` without knowing which provider is behind it.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Send a request and get a complete, validated reply.
    async fn generate(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<ChatReply, ProviderError>;

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
