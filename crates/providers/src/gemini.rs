//! Gemini provider implementation.
//!
//! Uses the Generative Language `generateContent` API directly.
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - System instructions as a top-level field
//! - History seeded as alternating user/model `contents`
//! - Validated candidate extraction — an empty or missing text part is a
//!   provider failure, never a silent empty reply

use async_trait::async_trait;
use clara_core::error::ProviderError;
use clara_core::provider::{ChatProvider, ChatReply, ChatRequest, ChatTurn, TurnRole};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert seeded history plus the current message to API contents.
    fn to_api_contents(history: &[ChatTurn], message: &str) -> Vec<ApiContent> {
        let mut contents: Vec<ApiContent> = history
            .iter()
            .map(|turn| ApiContent {
                role: match turn.role {
                    TurnRole::User => "user".into(),
                    TurnRole::Model => "model".into(),
                },
                parts: vec![ApiPart {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        contents.push(ApiContent {
            role: "user".into(),
            parts: vec![ApiPart {
                text: message.to_string(),
            }],
        });

        contents
    }

    /// Extract the reply text from the first candidate's content parts.
    ///
    /// Missing candidates, missing parts, or whitespace-only text all map
    /// to `EmptyCompletion` so the caller can trigger its fallback.
    fn extract_text(response: ApiResponse) -> Result<String, ProviderError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyCompletion("no candidates in response".into()))?;

        let content = candidate
            .content
            .ok_or_else(|| ProviderError::EmptyCompletion("candidate has no content".into()))?;

        let text: String = content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion(
                "candidate text is empty".into(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: ChatRequest) -> Result<ChatReply, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );

        let mut body = serde_json::json!({
            "contents": Self::to_api_contents(&request.history, &request.message),
            "generationConfig": {
                "temperature": request.temperature,
            },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        if let Some(system) = &request.system {
            body["systemInstruction"] = serde_json::json!(ApiContent {
                role: "user".into(),
                parts: vec![ApiPart {
                    text: system.clone()
                }],
            });
        }

        debug!(provider = "gemini", model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse Gemini response: {e}"),
        })?;

        let text = Self::extract_text(api_resp)?;

        Ok(ChatReply {
            text,
            model: request.model,
        })
    }
}

// --- Wire types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiContent {
    role: String,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}
