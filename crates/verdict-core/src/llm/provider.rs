//! Remote LLM provider contract (§6: "LLM provider").
//!
//! Mirrors [`crate::embeddings::provider`]: an opaque remote service behind a trait, with one
//! concrete `reqwest`-backed implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// What the classifier needs from a remote LLM provider: send a prompt, get raw text back.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32, max_output_tokens: u32) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// HTTP-backed LLM provider, calling a remote `generate` endpoint per §6.
pub struct HttpLlmProvider {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl HttpLlmProvider {
    pub fn new(endpoint: impl Into<String>, model_id: impl Into<String>, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            client,
            endpoint: endpoint.into(),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn generate(&self, prompt: &str, temperature: f32, max_output_tokens: u32) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::InvalidInput("prompt cannot be empty".to_string()));
        }

        let body = GenerateRequest {
            model: &self.model_id,
            prompt,
            temperature,
            max_output_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    LlmError::Unavailable(e.to_string())
                } else {
                    LlmError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(LlmError::RateLimited { retry_after });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Unauthorized(format!("status {status}")));
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(LlmError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(LlmError::Upstream(format!("status {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Upstream(format!("malformed generate response: {e}")))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(String);

    #[async_trait]
    impl LlmProvider for StaticProvider {
        async fn generate(&self, prompt: &str, _temperature: f32, _max_output_tokens: u32) -> Result<String, LlmError> {
            if prompt.is_empty() {
                return Err(LlmError::InvalidInput("empty".to_string()));
            }
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn trait_object_dispatches_correctly() {
        let provider: Box<dyn LlmProvider> = Box::new(StaticProvider("{}".to_string()));
        let text = provider.generate("hello", 0.1, 100).await.unwrap();
        assert_eq!(text, "{}");
    }
}
