//! ModelClient trait — the abstraction over language model backends.
//!
//! A ModelClient knows how to send a prompt to a model and get text back.
//! Tier 2 talks to a local Ollama instance; tier 3 talks to a remote
//! endpoint. The router and scenario handlers call `generate()` without
//! knowing which backend is behind it.

use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters for a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// The model to use (e.g. "llama3.1:8b", "anthropic/claude-3.5-haiku").
    pub model: String,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 512,
            temperature: 0.7,
        }
    }
}

/// The text a model produced, plus token accounting when the backend
/// reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOutput {
    /// The generated text.
    pub text: String,

    /// Prompt tokens consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u32>,

    /// Completion tokens produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u32>,
}

/// The model client trait. Tier-2 and tier-3 executors depend on this seam,
/// so tests can substitute deterministic fakes.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g. "ollama", "remote").
    fn name(&self) -> &str;

    /// Send a prompt and get generated text back.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<ModelOutput, ModelError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        Ok(true)
    }
}
