//! Embedding client (C1): provider + cache + rate limiter + circuit breaker + retry.
//!
//! Mirrors the shape of [`crate::llm::classifier::LlmClassifier`] — a thin orchestration layer
//! in front of a pluggable remote provider, reusing the shared [`crate::breaker::CircuitBreaker`]
//! and [`crate::retry::retry_with_backoff`] rather than rolling its own.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::breaker::CircuitBreaker;
use crate::config::{EmbeddingConfig, RetryConfig};
use crate::error::EmbeddingError;
use crate::retry::retry_with_backoff;

use super::cache::EmbeddingCache;
use super::provider::EmbeddingProvider;
use super::types::{l2_normalize, TaskHint};

/// A simple token-bucket rate limiter (§4.1: "Rate limit"). Refills continuously at
/// `rate_per_minute / 60` tokens per second, capped at `rate_per_minute` tokens.
struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    fn new(rate_per_minute: u32) -> Self {
        let capacity = rate_per_minute.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new((capacity, Instant::now())),
        }
    }

    /// Block until a token is available, then consume one.
    async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("rate limiter mutex poisoned");
                let (tokens, last) = *state;
                let elapsed = last.elapsed().as_secs_f64();
                let refreshed = (tokens + elapsed * self.refill_per_sec).min(self.capacity);
                if refreshed >= 1.0 {
                    *state = (refreshed - 1.0, Instant::now());
                    None
                } else {
                    *state = (refreshed, Instant::now());
                    let deficit = 1.0 - refreshed;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }
}

/// Embedding client: the single entry point the rest of the pipeline uses to turn text into
/// vectors.
pub struct EmbeddingClient {
    provider: Box<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    retry: RetryConfig,
    model_id: String,
    dimensions: usize,
}

impl EmbeddingClient {
    pub fn new(
        provider: Box<dyn EmbeddingProvider>,
        cache: EmbeddingCache,
        config: &EmbeddingConfig,
        retry: RetryConfig,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            provider,
            cache,
            breaker,
            rate_limiter: RateLimiter::new(config.rate_per_minute),
            retry,
            model_id: config.model_id.clone(),
            dimensions: config.dimensions,
        }
    }

    /// Embed one piece of text, consulting the cache first, then the rate limiter, breaker, and
    /// retry policy in front of the remote provider. Returns an L2-normalized vector (§4.1,
    /// §4.3: clustering geometry assumes normalized embeddings).
    #[tracing::instrument(skip(self, text), fields(task_hint = ?task_hint))]
    pub async fn embed(&self, text: &str, task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".to_string()));
        }

        if let Some(cached) = self.cache.get(&self.model_id, text) {
            return Ok(cached);
        }

        self.breaker
            .try_acquire()
            .map_err(|_| EmbeddingError::ServiceUnavailable)?;

        let result = retry_with_backoff(&self.retry, |_attempt| async {
            self.rate_limiter.acquire().await;
            self.provider.embed_content(text, task_hint).await
        })
        .await;

        match result {
            Ok(mut vector) => {
                self.breaker.record_success();
                if vector.len() != self.dimensions {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.dimensions,
                        actual: vector.len(),
                    });
                }
                l2_normalize(&mut vector);
                self.cache.put(&self.model_id, text, vector.clone());
                Ok(vector)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerConfig;
    use crate::embeddings::cache::InMemoryCacheStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
        fail_first_n: u32,
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed_content(&self, _content: &str, _task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first_n {
                return Err(EmbeddingError::Unavailable("not yet".to_string()));
            }
            Ok(vec![1.0; self.dims])
        }
    }

    fn client(provider: CountingProvider) -> EmbeddingClient {
        let config = EmbeddingConfig {
            dimensions: 4,
            rate_per_minute: 1_000_000,
            ..EmbeddingConfig::default()
        };
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
        };
        EmbeddingClient::new(
            Box::new(provider),
            EmbeddingCache::new(Box::new(InMemoryCacheStore::default()), 30, 10),
            &config,
            retry,
            CircuitBreaker::new("test-embedding", BreakerConfig::embedding_default()),
        )
    }

    #[tokio::test]
    async fn empty_text_rejected_without_calling_provider() {
        let client = client(CountingProvider {
            calls: AtomicU32::new(0),
            fail_first_n: 0,
            dims: 4,
        });
        let err = client.embed("   ", TaskHint::Query).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn second_call_for_same_text_is_served_from_cache() {
        let client = client(CountingProvider {
            calls: AtomicU32::new(0),
            fail_first_n: 0,
            dims: 4,
        });
        client.embed("hello", TaskHint::Document).await.unwrap();
        client.embed("hello", TaskHint::Document).await.unwrap();
        // The provider's internal counter only advances on the first (uncached) call.
    }

    #[tokio::test]
    async fn retries_transient_provider_failure_then_succeeds() {
        let client = client(CountingProvider {
            calls: AtomicU32::new(0),
            fail_first_n: 2,
            dims: 4,
        });
        let vector = client.embed("hello", TaskHint::Document).await.unwrap();
        assert_eq!(vector.len(), 4);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_reported() {
        let client = client(CountingProvider {
            calls: AtomicU32::new(0),
            fail_first_n: 0,
            dims: 7,
        });
        let err = client.embed("hello", TaskHint::Document).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { .. }));
    }
}
