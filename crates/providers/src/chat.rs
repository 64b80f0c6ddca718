//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use ekimate_core::{GenerationParams, ModelClient, ModelError, ModelOutput};
use serde::Deserialize;
use tracing::{debug, warn};

/// HTTP client for any OpenAI-compatible chat completions endpoint.
pub struct ChatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a client for a named endpoint.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Local Ollama instance (tier 2). Ollama ignores the API key.
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    /// Remote endpoint (tier 3).
    pub fn remote(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::new("remote", base_url, api_key)
    }
}

#[async_trait]
impl ModelClient for ChatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<ModelOutput, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": params.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "stream": false,
        });

        debug!(client = %self.name, model = %params.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(format!("{} request timed out", self.name))
                } else {
                    ModelError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ModelError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model backend returned error");
            return Err(ModelError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ModelError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(ModelOutput {
            text: choice.message.content.unwrap_or_default(),
            tokens_in: api_response.usage.as_ref().map(|u| u.prompt_tokens),
            tokens_out: api_response.usage.as_ref().map(|u| u.completion_tokens),
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ModelError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- API types (internal) ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_constructor() {
        let client = ChatClient::ollama(None);
        assert_eq!(client.name(), "ollama");
        assert!(client.base_url.contains("localhost:11434"));
    }

    #[test]
    fn remote_constructor_trims_trailing_slash() {
        let client = ChatClient::remote("https://api.example.com/v1/", "sk-test");
        assert_eq!(client.name(), "remote");
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Kippu means ticket."}}],
            "usage": {"prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Kippu means ticket.")
        );
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 42);
    }

    #[test]
    fn parse_response_without_usage() {
        let data = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.usage.is_none());
    }
}
