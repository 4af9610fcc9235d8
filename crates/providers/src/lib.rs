//! LLM Provider implementations for Clara.
//!
//! All providers implement the `clara_core::ChatProvider` trait.
//! `build_provider` constructs the right one from configuration.

pub mod gemini;
pub mod openai_compat;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;

use clara_config::ProviderConfig;
use clara_core::ChatProvider;
use std::sync::Arc;

/// Build a provider from its configuration section.
///
/// Returns `None` when the section is not configured (no kind or api key) —
/// the pipeline treats an absent fallback as "not configured" rather than
/// an error.
pub fn build_provider(config: &ProviderConfig) -> Option<Arc<dyn ChatProvider>> {
    if !config.is_configured() {
        return None;
    }

    let api_key = config.api_key.clone()?;
    match config.kind.as_deref()? {
        "gemini" => {
            let mut provider = GeminiProvider::new(api_key);
            if let Some(url) = &config.api_url {
                provider = provider.with_base_url(url);
            }
            Some(Arc::new(provider))
        }
        "openai" => {
            let base_url = config
                .api_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".into());
            Some(Arc::new(OpenAiCompatProvider::new(
                "openai", base_url, api_key,
            )))
        }
        other => {
            tracing::warn!(kind = %other, "Unknown provider kind in config, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_section_builds_nothing() {
        let config = ProviderConfig::default();
        assert!(build_provider(&config).is_none());
    }

    #[test]
    fn gemini_section_builds_gemini() {
        let config = ProviderConfig {
            kind: Some("gemini".into()),
            api_key: Some("key".into()),
            api_url: None,
            model: None,
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn openai_section_builds_openai() {
        let config = ProviderConfig {
            kind: Some("openai".into()),
            api_key: Some("key".into()),
            api_url: None,
            model: None,
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn unknown_kind_builds_nothing() {
        let config = ProviderConfig {
            kind: Some("mystery".into()),
            api_key: Some("key".into()),
            api_url: None,
            model: None,
        };
        assert!(build_provider(&config).is_none());
    }
}
