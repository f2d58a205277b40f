//! Remote embedding provider contract (§6: "Embedding provider").
//!
//! `embed_content({model, content, task_type}) -> {embedding: [float; D]}`. The provider is an
//! opaque remote service (§1); [`EmbeddingProvider`] is the seam a deployment implements (or
//! replaces with a mock in tests). [`HttpEmbeddingProvider`] is the one concrete implementation
//! this crate ships, built over `reqwest`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

use super::types::TaskHint;

/// What the pipeline needs from a remote embedding provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text. Empty text must fail with `InvalidInput` before any remote
    /// call is made (§4.1).
    async fn embed_content(&self, content: &str, task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: &'a str,
    task_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP-backed embedding provider, calling a remote `embed_content` endpoint per §6.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl HttpEmbeddingProvider {
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
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_content(&self, content: &str, task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError> {
        if content.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".to_string()));
        }

        let body = EmbedRequest {
            model: &self.model_id,
            content,
            task_type: task_hint.wire_value(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    EmbeddingError::Unavailable(e.to_string())
                } else {
                    EmbeddingError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(EmbeddingError::RateLimited { retry_after });
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(EmbeddingError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(EmbeddingError::Upstream(format!("status {status}")));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Upstream(format!("malformed embedding response: {e}")))?;

        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for StaticProvider {
        async fn embed_content(&self, content: &str, _task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError> {
            if content.is_empty() {
                return Err(EmbeddingError::InvalidInput("empty".to_string()));
            }
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn trait_object_dispatches_correctly() {
        let provider: Box<dyn EmbeddingProvider> = Box::new(StaticProvider(vec![1.0, 0.0]));
        let vec = provider.embed_content("hello", TaskHint::Query).await.unwrap();
        assert_eq!(vec, vec![1.0, 0.0]);
        assert!(provider.embed_content("", TaskHint::Query).await.is_err());
    }
}
