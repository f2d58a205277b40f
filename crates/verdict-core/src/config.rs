//! Configuration surface (§6).
//!
//! Mirrors the original `backend/config.py` settings object, reimplemented as a plain struct
//! per section with typed defaults instead of a pydantic settings class — see SPEC_FULL
//! §2 ("Ambient stack"). Every option has a safe default; [`PipelineConfig::from_env`] overlays
//! environment variables on top of [`PipelineConfig::default`].

use std::time::Duration;

/// Embedding client configuration (§4.1, §6).
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Model identifier sent to the remote embedding provider.
    pub model_id: String,
    /// Token-bucket ceiling, requests per minute.
    pub rate_per_minute: u32,
    /// Cache entry time-to-live, in days.
    pub cache_ttl_days: i64,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Fixed embedding dimension for this deployment.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: "text-embedding-default".to_string(),
            rate_per_minute: 50,
            cache_ttl_days: 30,
            timeout: Duration::from_secs(10),
            dimensions: 768,
        }
    }
}

/// LLM classifier configuration (§4.5, §6).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier sent to the remote LLM provider.
    pub model_id: String,
    /// Sampling temperature (fixed low per §4.5).
    pub temperature: f32,
    /// Maximum tokens the model may emit.
    pub max_output_tokens: u32,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_id: "legal-classifier-default".to_string(),
            temperature: 0.1,
            max_output_tokens: 1000,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Retry policy configuration, shared by the embedding and LLM clients (§4.5).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Cap on the computed delay.
    pub max_delay: Duration,
    /// Jitter fraction applied symmetrically around the computed delay (e.g. 0.1 = ±10%).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            jitter: 0.10,
        }
    }
}

/// Circuit breaker configuration, one instance per external service (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// Seconds the breaker stays open before probing again.
    pub recovery_timeout: Duration,
    /// Number of half-open probe calls admitted before deciding close/reopen.
    pub half_open_max_calls: u32,
}

impl BreakerConfig {
    /// Default breaker tuning for the LLM provider (§4.5: failure_threshold=5).
    pub fn llm_default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }

    /// Default breaker tuning for the embedding provider (shares the LLM defaults; the spec
    /// only singles out the store breaker's threshold as different).
    pub fn embedding_default() -> Self {
        Self::llm_default()
    }

    /// Default breaker tuning for the reference/rule/classification store (§4.5:
    /// failure_threshold=3 for the store).
    pub fn store_default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
        }
    }
}

/// K-means clustering configuration (§4.3, §6).
#[derive(Debug, Clone)]
pub struct ClusteringConfig {
    /// Minimum K considered.
    pub min_k: usize,
    /// Maximum K considered.
    pub max_k: usize,
    /// Number of random initializations per K.
    pub n_init: usize,
    /// Iteration cap per initialization.
    pub max_iter: usize,
    /// Fixed seed for reproducibility across recomputes on identical inputs.
    pub random_seed: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_k: 2,
            max_k: 20,
            n_init: 10,
            max_iter: 300,
            random_seed: 1337,
        }
    }
}

/// Context retrieval configuration (§4.4, §6).
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Number of buckets considered per query.
    pub top_k_buckets: usize,
    /// Minimum bucket similarity to be considered relevant.
    pub min_bucket_similarity: f32,
    /// Overall chunk budget across all selected buckets.
    pub max_context_chunks: usize,
    /// Target chunk size, in characters.
    pub chunk_size: usize,
    /// Overlap between adjacent chunks, in characters.
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_buckets: 3,
            min_bucket_similarity: 0.7,
            max_context_chunks: 10,
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Weights for the five confidence factors (§4.7). Normalized to sum to 1.0 at construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceWeights {
    pub model: f64,
    pub similarity: f64,
    pub rules: f64,
    pub evidence_quality: f64,
    pub calibration: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            model: 0.40,
            similarity: 0.25,
            rules: 0.20,
            evidence_quality: 0.10,
            calibration: 0.05,
        }
    }
}

impl ConfidenceWeights {
    /// Renormalize so the five weights sum to 1.0, logging a warning if the caller's supplied
    /// weights did not already (§4.7: "if user-supplied weights sum to something else,
    /// renormalize and log").
    pub fn normalized(self) -> Self {
        let sum = self.model + self.similarity + self.rules + self.evidence_quality + self.calibration;
        if (sum - 1.0).abs() > 1e-9 {
            if sum <= 0.0 {
                tracing::warn!(sum, "confidence weights summed to <= 0; falling back to defaults");
                return Self::default();
            }
            tracing::warn!(sum, "confidence weights did not sum to 1.0; renormalizing");
            return Self {
                model: self.model / sum,
                similarity: self.similarity / sum,
                rules: self.rules / sum,
                evidence_quality: self.evidence_quality / sum,
                calibration: self.calibration / sum,
            };
        }
        self
    }
}

/// Confidence/warning/routing thresholds (§4.7, §6).
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceConfig {
    /// Weighting of the five factors.
    pub weights: ConfidenceWeights,
    /// Below this, warning level is `critical`.
    pub critical_threshold: f64,
    /// Below this (and above critical), warning level is `high`.
    pub high_threshold: f64,
    /// Below this (and above high), warning level is `medium`.
    pub medium_threshold: f64,
    /// Below this (and above medium), warning level is `low`; at/above, no warning.
    pub low_threshold: f64,
    /// Window of days over which historical calibration samples are drawn.
    pub calibration_window_days: i64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default().normalized(),
            critical_threshold: 0.3,
            high_threshold: 0.5,
            medium_threshold: 0.7,
            low_threshold: 0.85,
            calibration_window_days: 30,
        }
    }
}

/// The full pipeline configuration, one per orchestrator instance.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub clustering: ClusteringConfig,
    pub retrieval: RetrievalConfig,
    pub confidence: ConfidenceConfig,
}

impl PipelineConfig {
    /// Overlay recognized environment variables on top of the defaults. Unset variables keep
    /// their default; malformed values are logged and ignored (the default wins), mirroring the
    /// original settings object's validators without making startup fail on a typo.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_f64("VERDICT_CONFIDENCE_AUTO_ACCEPT") {
            cfg.confidence.low_threshold = v;
        }
        if let Some(v) = env_usize("VERDICT_TOP_K_BUCKETS") {
            cfg.retrieval.top_k_buckets = v;
        }
        if let Some(v) = env_usize("VERDICT_MAX_CONTEXT_CHUNKS") {
            cfg.retrieval.max_context_chunks = v;
        }
        if let Some(v) = env_u32("VERDICT_EMBEDDING_RATE_PER_MINUTE") {
            cfg.embedding.rate_per_minute = v;
        }
        if let Ok(model) = std::env::var("VERDICT_LLM_MODEL_ID") {
            cfg.llm.model_id = model;
        }
        if let Ok(model) = std::env::var("VERDICT_EMBEDDING_MODEL_ID") {
            cfg.embedding.model_id = model;
        }

        cfg
    }
}

fn env_f64(key: &str) -> Option<f64> {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, raw, "ignoring malformed float env var");
                None
            }
        },
        Err(_) => None,
    }
}

fn env_usize(key: &str) -> Option<usize> {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, raw, "ignoring malformed integer env var");
                None
            }
        },
        Err(_) => None,
    }
}

fn env_u32(key: &str) -> Option<u32> {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, raw, "ignoring malformed integer env var");
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_confidence_weights_sum_to_one() {
        let w = ConfidenceWeights::default().normalized();
        let sum = w.model + w.similarity + w.rules + w.evidence_quality + w.calibration;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn renormalizes_non_unit_weights() {
        let w = ConfidenceWeights {
            model: 1.0,
            similarity: 1.0,
            rules: 1.0,
            evidence_quality: 1.0,
            calibration: 1.0,
        }
        .normalized();
        let sum = w.model + w.similarity + w.rules + w.evidence_quality + w.calibration;
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((w.model - 0.2).abs() < 1e-9);
    }

    #[test]
    fn breaker_defaults_match_spec() {
        assert_eq!(BreakerConfig::llm_default().failure_threshold, 5);
        assert_eq!(BreakerConfig::store_default().failure_threshold, 3);
    }
}
