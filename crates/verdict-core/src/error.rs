//! Error taxonomy shared across the pipeline.
//!
//! Each subsystem defines its own narrow error enum (`EmbeddingError`, `StoreError`,
//! `LlmError`, `RuleError`); [`PipelineError`] is the umbrella the orchestrator's public
//! methods return, with `#[from]` conversions so call sites can use `?` without manual
//! mapping.

use thiserror::Error;

/// Error returned by the embedding client (C1).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Caller passed empty or otherwise unusable text.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Remote provider returned 429; `retry_after` is the server-supplied hint, if any.
    #[error("rate limited{}", .retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying, per the provider's `Retry-After` header.
        retry_after: Option<u64>,
    },
    /// Remote provider returned 503 or a connection-level failure.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    /// Any other remote error (4xx/5xx not covered above).
    #[error("embedding provider upstream error: {0}")]
    Upstream(String),
    /// The circuit breaker in front of the embedding provider is open.
    #[error("embedding service unavailable (circuit open)")]
    ServiceUnavailable,
    /// Embedding dimension returned by the provider does not match the deployment constant.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension fixed at deployment init.
        expected: usize,
        /// Dimension actually returned.
        actual: usize,
    },
}

/// Error returned by persistence-layer operations (C2, and the rule/classification/audit
/// stores).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document with the same content hash already exists.
    #[error("duplicate content hash: {0}")]
    Duplicate(String),
    /// No record exists for the given id.
    #[error("not found: {0}")]
    NotFound(String),
    /// The caller supplied data that fails a model invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Underlying SQLite error.
    #[cfg(feature = "sqlite-store")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Serialization failure when reading/writing a JSON-encoded column.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Filesystem or connection-setup failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Store initialization failed (e.g. could not resolve a default data directory).
    #[error("store initialization error: {0}")]
    Init(String),
}

/// Error returned by the LLM classifier (C5) below the fallback boundary.
///
/// This is intentionally never surfaced to the orchestrator: when retries and the circuit
/// breaker are both exhausted, [`crate::llm::fallback`] takes over and produces a degraded
/// but valid result instead.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// Caller passed an empty document or malformed context.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Remote provider returned 429.
    #[error("rate limited{}", .retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },
    /// Remote provider returned 503 or a connection-level failure.
    #[error("llm provider unavailable: {0}")]
    Unavailable(String),
    /// Any other remote error.
    #[error("llm provider upstream error: {0}")]
    Upstream(String),
    /// The model's response did not contain a parseable, well-formed classification object.
    #[error("failed to parse model response: {0}")]
    ParseError(String),
    /// An authorization failure the retry policy must not retry.
    #[error("llm provider authorization failed: {0}")]
    Unauthorized(String),
    /// The circuit breaker in front of the LLM provider is open.
    #[error("llm service unavailable (circuit open)")]
    ServiceUnavailable,
}

impl LlmError {
    /// Whether the retry policy in §4.5 should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Unavailable(_)
                | LlmError::Upstream(_)
                | LlmError::ParseError(_)
        )
    }
}

impl EmbeddingError {
    /// Whether the retry policy should retry this error (same transient kinds as [`LlmError`]).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::RateLimited { .. }
                | EmbeddingError::Unavailable(_)
                | EmbeddingError::Upstream(_)
        )
    }
}

impl crate::retry::Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        EmbeddingError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            EmbeddingError::RateLimited { retry_after } => retry_after.map(std::time::Duration::from_secs),
            _ => None,
        }
    }
}

impl crate::retry::Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        LlmError::is_retryable(self)
    }

    fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            LlmError::RateLimited { retry_after } => retry_after.map(std::time::Duration::from_secs),
            _ => None,
        }
    }
}

/// Error returned by rule-engine operations (C6).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule's condition list was empty, or a condition referenced an invalid comparand.
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    /// A regex condition failed to compile. The rule is disabled, not rejected outright.
    #[error("rule {rule_id} has a non-compiling regex and was deactivated: {source}")]
    InvalidRegex {
        /// The offending rule's id.
        rule_id: String,
        /// The underlying regex compile error.
        #[source]
        source: regex::Error,
    },
}

/// Top-level error returned by the orchestrator's public API.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller-supplied input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A persistence operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The embedding client failed in a way the pipeline could not route around.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// The rule engine rejected the active rule set.
    #[error(transparent)]
    Rule(#[from] RuleError),
    /// The classification deadline expired before the pipeline completed.
    #[error("classification deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded {
        /// Wall-clock time elapsed before cancellation, in milliseconds.
        elapsed_ms: u64,
    },
    /// An unexpected failure that does not fit the taxonomy above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        // LlmError below the fallback boundary should never reach here in practice (the
        // classifier degrades to the keyword fallback instead of propagating); this
        // conversion exists for the rare case the fallback itself fails to produce a result.
        match err {
            LlmError::InvalidInput(msg) => PipelineError::InvalidInput(msg),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}
