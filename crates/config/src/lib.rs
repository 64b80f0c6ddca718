//! Configuration loading, validation, and management for Ekimate.
//!
//! Loads configuration from `~/.ekimate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ekimate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the remote tier (can be set via environment instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Intent classification settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Conversation context settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Tier routing settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Decision tree settings
    #[serde(default)]
    pub trees: TreeConfig,

    /// Usage and quota settings
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Prompt assembly settings
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Local model (tier 2) settings
    #[serde(default)]
    pub tier2: ModelConfig,

    /// Remote model (tier 3) settings
    #[serde(default)]
    pub tier3: ModelConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("classifier", &self.classifier)
            .field("context", &self.context)
            .field("router", &self.router)
            .field("trees", &self.trees)
            .field("quota", &self.quota)
            .field("prompt", &self.prompt)
            .field("tier2", &self.tier2)
            .field("tier3", &self.tier3)
            .finish()
    }
}

/// Intent classification scoring weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Score contributed by each matched intent keyword
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Score boost when an extracted entity supports the intent
    #[serde(default = "default_entity_boost")]
    pub entity_boost: f32,
}

fn default_keyword_weight() -> f32 {
    1.0
}
fn default_entity_boost() -> f32 {
    1.5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keyword_weight: default_keyword_weight(),
            entity_boost: default_entity_boost(),
        }
    }
}

/// Conversation context store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Seconds of inactivity before a conversation expires
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum entries kept per conversation (FIFO beyond this)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// What happens to the escalation floor on a topic switch:
    /// "reset" or "suspend"
    #[serde(default = "default_escalation_policy")]
    pub escalation_policy: String,
}

fn default_ttl_secs() -> u64 {
    1800
}
fn default_max_entries() -> usize {
    50
}
fn default_escalation_policy() -> String {
    "reset".into()
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            escalation_policy: default_escalation_policy(),
        }
    }
}

/// Tier routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Per-attempt deadline for tier 1 in milliseconds
    #[serde(default = "default_tier1_timeout_ms")]
    pub tier1_timeout_ms: u64,

    /// Per-attempt deadline for tier 2 in milliseconds
    #[serde(default = "default_tier2_timeout_ms")]
    pub tier2_timeout_ms: u64,

    /// Per-attempt deadline for tier 3 in milliseconds
    #[serde(default = "default_tier3_timeout_ms")]
    pub tier3_timeout_ms: u64,

    /// Whether the remote tier is available at all
    #[serde(default = "default_true")]
    pub tier3_enabled: bool,

    /// The fixed response served when every tier fails
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
}

fn default_tier1_timeout_ms() -> u64 {
    150
}
fn default_tier2_timeout_ms() -> u64 {
    8_000
}
fn default_tier3_timeout_ms() -> u64 {
    20_000
}
fn default_true() -> bool {
    true
}
fn default_fallback_response() -> String {
    "Hmm, I didn't quite catch that. Could you try asking in a different way?".into()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            tier1_timeout_ms: default_tier1_timeout_ms(),
            tier2_timeout_ms: default_tier2_timeout_ms(),
            tier3_timeout_ms: default_tier3_timeout_ms(),
            tier3_enabled: true,
            fallback_response: default_fallback_response(),
        }
    }
}

/// Decision tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maximum traversal depth before a tree walk is treated as a failure
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    16
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

/// Usage limits for the remote tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Maximum remote requests per rolling hour bucket
    #[serde(default = "default_hourly_requests")]
    pub hourly_requests: u32,

    /// Maximum remote tokens per calendar day (UTC)
    #[serde(default = "default_daily_tokens")]
    pub daily_tokens: u64,

    /// Maximum remote spend per calendar month in USD
    #[serde(default = "default_monthly_usd")]
    pub monthly_usd: f64,

    /// Custom per-million-token pricing overrides (model name -> pricing)
    #[serde(default)]
    pub custom_pricing: HashMap<String, PricingOverrideConfig>,
}

fn default_hourly_requests() -> u32 {
    60
}
fn default_daily_tokens() -> u64 {
    200_000
}
fn default_monthly_usd() -> f64 {
    25.0
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            hourly_requests: default_hourly_requests(),
            daily_tokens: default_daily_tokens(),
            monthly_usd: default_monthly_usd(),
            custom_pricing: HashMap::new(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

/// Prompt assembly settings for the model tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// How many recent turns to include in model prompts
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Hard cap on response length in characters
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,
}

fn default_history_window() -> usize {
    3
}
fn default_max_response_chars() -> usize {
    2_000
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_response_chars: default_max_response_chars(),
        }
    }
}

/// Settings for one model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Endpoint base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ekimate/config.toml).
    ///
    /// Environment overrides:
    /// - `EKIMATE_CONFIG` — alternate config file path
    /// - `EKIMATE_API_KEY` — remote tier API key
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = match std::env::var("EKIMATE_CONFIG") {
            Ok(p) => PathBuf::from(p),
            Err(_) => Self::config_dir().join("config.toml"),
        };
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("EKIMATE_API_KEY").ok();
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
        dirs_home().join(".ekimate")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "context.ttl_secs must be > 0".into(),
            ));
        }

        if self.context.max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_entries must be > 0".into(),
            ));
        }

        if self.classifier.keyword_weight <= 0.0 {
            return Err(ConfigError::ValidationError(
                "classifier.keyword_weight must be > 0".into(),
            ));
        }

        match self.context.escalation_policy.as_str() {
            "reset" | "suspend" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "context.escalation_policy must be \"reset\" or \"suspend\", got \"{other}\""
                )));
            }
        }

        if self.trees.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "trees.max_depth must be > 0".into(),
            ));
        }

        for (name, cfg) in [("tier2", &self.tier2), ("tier3", &self.tier3)] {
            if cfg.temperature < 0.0 || cfg.temperature > 2.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{name}.temperature must be between 0.0 and 2.0"
                )));
            }
        }

        if self.quota.monthly_usd < 0.0 {
            return Err(ConfigError::ValidationError(
                "quota.monthly_usd must be >= 0".into(),
            ));
        }

        if self.router.fallback_response.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "router.fallback_response must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `doctor` output).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            classifier: ClassifierConfig::default(),
            context: ContextConfig::default(),
            router: RouterConfig::default(),
            trees: TreeConfig::default(),
            quota: QuotaConfig::default(),
            prompt: PromptConfig::default(),
            tier2: ModelConfig::default(),
            tier3: ModelConfig::default(),
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
        assert_eq!(config.context.ttl_secs, 1800);
        assert_eq!(config.context.max_entries, 50);
        assert_eq!(config.quota.hourly_requests, 60);
        assert!(config.router.tier3_enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.context.ttl_secs, config.context.ttl_secs);
        assert_eq!(parsed.router.tier1_timeout_ms, config.router.tier1_timeout_ms);
    }

    #[test]
    fn invalid_escalation_policy_rejected() {
        let config = AppConfig {
            context: ContextConfig {
                escalation_policy: "discard".into(),
                ..ContextConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_fallback_response_rejected() {
        let config = AppConfig {
            router: RouterConfig {
                fallback_response: "   ".into(),
                ..RouterConfig::default()
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
        assert_eq!(config.trees.max_depth, 16);
    }

    #[test]
    fn partial_config_parses_with_defaults() {
        let toml_str = r#"
[quota]
hourly_requests = 10
monthly_usd = 5.0

[tier2]
api_url = "http://localhost:11434/v1"
model = "llama3.1:8b"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.quota.hourly_requests, 10);
        assert_eq!(config.quota.daily_tokens, 200_000);
        assert_eq!(config.tier2.model.as_deref(), Some("llama3.1:8b"));
        assert_eq!(config.tier2.max_tokens, 512);
    }

    #[test]
    fn custom_pricing_parses() {
        let toml_str = r#"
[quota.custom_pricing."my-model"]
input_per_m = 1.5
output_per_m = 6.0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let p = &config.quota.custom_pricing["my-model"];
        assert!((p.input_per_m - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("[REDACTED]"));
    }
}
