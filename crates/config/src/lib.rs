//! Configuration loading, validation, and management for Clara.
//!
//! Loads configuration from `~/.clara/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.clara/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Primary LLM provider
    #[serde(default)]
    pub primary: ProviderConfig,

    /// Fallback LLM provider (optional — turns fail terminally without it
    /// when the primary is down)
    #[serde(default)]
    pub fallback: ProviderConfig,

    /// Generation settings shared by both providers
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Daily interaction quota settings
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Persona settings
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Data store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Configuration for a single LLM provider.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// Provider kind: "gemini" or "openai"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderConfig {
    /// Whether this provider has enough configuration to be constructed.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.kind.is_some()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .field("generation", &self.generation)
            .field("quota", &self.quota)
            .field("persona", &self.persona)
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Bounded timeout applied to each provider attempt
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_provider_timeout_secs() -> u64 {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            provider_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Daily interaction ceiling for the free plan
    #[serde(default = "default_free_daily_limit")]
    pub free_daily_limit: i64,
}

fn default_free_daily_limit() -> i64 {
    15
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_daily_limit: default_free_daily_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonaConfig {
    /// Override the built-in persona prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend: "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path (ignored for the memory backend)
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "clara.db".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Bearer token → user ID. Empty map = all requests rejected as
    /// unauthenticated.
    #[serde(default)]
    pub auth_tokens: HashMap<String, String>,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            auth_tokens: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.clara/config.toml).
    ///
    /// Also checks environment variables:
    /// - `CLARA_PRIMARY_API_KEY` / `GEMINI_API_KEY` for the primary provider
    /// - `CLARA_FALLBACK_API_KEY` / `OPENAI_API_KEY` for the fallback
    /// - `CLARA_PRIMARY_MODEL` / `CLARA_FALLBACK_MODEL` for model overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.primary.api_key.is_none() {
            config.primary.api_key = std::env::var("CLARA_PRIMARY_API_KEY")
                .ok()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok());
            if config.primary.api_key.is_some() && config.primary.kind.is_none() {
                config.primary.kind = Some("gemini".into());
            }
        }

        if config.fallback.api_key.is_none() {
            config.fallback.api_key = std::env::var("CLARA_FALLBACK_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            if config.fallback.api_key.is_some() && config.fallback.kind.is_none() {
                config.fallback.kind = Some("openai".into());
            }
        }

        if let Ok(model) = std::env::var("CLARA_PRIMARY_MODEL") {
            config.primary.model = Some(model);
        }
        if let Ok(model) = std::env::var("CLARA_FALLBACK_MODEL") {
            config.fallback.model = Some(model);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".clara")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.quota.free_daily_limit <= 0 {
            return Err(ConfigError::ValidationError(
                "quota.free_daily_limit must be positive".into(),
            ));
        }

        if self.generation.provider_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.provider_timeout_secs must be positive".into(),
            ));
        }

        match self.store.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown store backend: {other}"
                )));
            }
        }

        for (kind, label) in [
            (&self.primary.kind, "primary"),
            (&self.fallback.kind, "fallback"),
        ] {
            if let Some(kind) = kind {
                if kind != "gemini" && kind != "openai" {
                    return Err(ConfigError::ValidationError(format!(
                        "unknown {label} provider kind: {kind}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig::default(),
            fallback: ProviderConfig::default(),
            generation: GenerationConfig::default(),
            quota: QuotaConfig::default(),
            persona: PersonaConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quota.free_daily_limit, 15);
        assert_eq!(config.gateway.port, 8787);
        assert_eq!(config.generation.provider_timeout_secs, 30);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.store.backend, config.store.backend);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            generation: GenerationConfig {
                temperature: 5.0,
                ..GenerationConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_store_backend_rejected() {
        let config = AppConfig {
            store: StoreConfig {
                backend: "mongodb".into(),
                ..StoreConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.quota.free_daily_limit, 15);
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[quota]\nfree_daily_limit = 3\n\n[gateway]\nport = 9999\n",
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.quota.free_daily_limit, 3);
        assert_eq!(config.gateway.port, 9999);
        assert_eq!(config.store.backend, "sqlite");
    }

    #[test]
    fn provider_section_parsing() {
        let toml_str = r#"
[primary]
kind = "gemini"
api_key = "test-key"
model = "gemini-1.5-flash"

[fallback]
kind = "openai"
api_key = "other-key"
model = "gpt-4o-mini"

[gateway]
port = 9000

[gateway.auth_tokens]
"token-abc" = "user-1"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.primary.is_configured());
        assert!(config.fallback.is_configured());
        assert_eq!(config.primary.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(
            config.gateway.auth_tokens.get("token-abc").map(String::as_str),
            Some("user-1")
        );
    }

    #[test]
    fn debug_redacts_api_keys() {
        let config = ProviderConfig {
            kind: Some("gemini".into()),
            api_key: Some("super-secret".into()),
            api_url: None,
            model: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("8787"));
        assert!(toml_str.contains("sqlite"));
    }
}
