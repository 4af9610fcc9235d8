//! Generation client — primary provider with a single fallback.
//!
//! Each attempt runs under a bounded timeout. The primary is always
//! tried first; on any failure (including timeout) the fallback gets one
//! attempt with the same system prompt but only the current message.
//! Prior turns stay with the primary. A terminal failure carries both
//! errors so the caller can log the full picture.
//!
//! Providers validate their own responses: an empty reply is an error,
//! never an empty string, so `GeneratedReply.text` is always non-empty.

use crate::context::AssembledContext;
use clara_core::error::ProviderError;
use clara_core::provider::{ChatProvider, ChatRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables shared by both provider attempts.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Model requested from the primary provider
    pub primary_model: String,

    /// Model requested from the fallback provider
    pub fallback_model: String,

    pub temperature: f32,
    pub max_tokens: u32,

    /// Bounded timeout applied to each provider attempt
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            primary_model: "gemini-1.5-flash".into(),
            fallback_model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

/// A successful generation and which provider produced it.
#[derive(Debug, Clone)]
pub struct GeneratedReply {
    /// Non-empty reply text
    pub text: String,

    /// Name of the provider that answered ("gemini", "openai", ...)
    pub provider: String,
}

/// Both attempts failed. Carries each provider's error.
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub primary_error: ProviderError,

    /// `None` when no fallback provider is configured
    pub fallback_error: Option<ProviderError>,
}

impl std::fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fallback_error {
            Some(fb) => write!(f, "primary: {}; fallback: {}", self.primary_error, fb),
            None => write!(f, "primary: {} (no fallback configured)", self.primary_error),
        }
    }
}

/// Calls the primary provider, falling back to the secondary on failure.
pub struct GenerationClient {
    primary: Arc<dyn ChatProvider>,
    fallback: Option<Arc<dyn ChatProvider>>,
    settings: GenerationSettings,
}

impl GenerationClient {
    pub fn new(
        primary: Arc<dyn ChatProvider>,
        fallback: Option<Arc<dyn ChatProvider>>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            primary,
            fallback,
            settings,
        }
    }

    /// Generate one reply for `message` with the assembled context.
    pub async fn generate(
        &self,
        context: &AssembledContext,
        message: &str,
    ) -> Result<GeneratedReply, GenerationFailure> {
        let primary_error = match self
            .attempt(
                &self.primary,
                &self.settings.primary_model,
                context,
                message,
                true,
            )
            .await
        {
            Ok(reply) => return Ok(reply),
            Err(e) => {
                warn!(
                    provider = self.primary.name(),
                    error = %e,
                    "Primary provider failed; trying fallback"
                );
                e
            }
        };

        let Some(fallback) = &self.fallback else {
            return Err(GenerationFailure {
                primary_error,
                fallback_error: None,
            });
        };

        // The fallback gets the current turn only, no history replay
        match self
            .attempt(
                fallback,
                &self.settings.fallback_model,
                context,
                message,
                false,
            )
            .await
        {
            Ok(reply) => Ok(reply),
            Err(fallback_error) => Err(GenerationFailure {
                primary_error,
                fallback_error: Some(fallback_error),
            }),
        }
    }

    async fn attempt(
        &self,
        provider: &Arc<dyn ChatProvider>,
        model: &str,
        context: &AssembledContext,
        message: &str,
        seed_history: bool,
    ) -> Result<GeneratedReply, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            system: Some(context.system_prompt.clone()),
            history: if seed_history {
                context.history.clone()
            } else {
                Vec::new()
            },
            message: message.to_string(),
            temperature: self.settings.temperature,
            max_tokens: Some(self.settings.max_tokens),
        };

        match tokio::time::timeout(self.settings.timeout, provider.generate(request)).await {
            Ok(Ok(reply)) => {
                info!(
                    provider = provider.name(),
                    model = %reply.model,
                    "Generation succeeded"
                );
                Ok(GeneratedReply {
                    text: reply.text,
                    provider: provider.name().to_string(),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout(format!(
                "Provider '{}' timed out after {}s",
                provider.name(),
                self.settings.timeout.as_secs()
            ))),
        }
    }
}
