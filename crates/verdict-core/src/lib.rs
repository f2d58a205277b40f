//! # Verdict Core
//!
//! Legal document severity classification pipeline: semantic retrieval over a clustered
//! reference corpus, LLM-backed classification with a deterministic keyword fallback,
//! rule-based overrides, and multi-factor confidence scoring with historical calibration.
//!
//! ## Pipeline
//!
//! 1. **Embeddings** ([`embeddings`]) — remote embedding provider behind a cache, retry budget,
//!    and circuit breaker.
//! 2. **Reference store** ([`store`]) — the reference-document corpus and bucket/rule/
//!    classification/audit persistence.
//! 3. **Bucket engine** ([`bucket`]) — cosine K-means clustering of reference embeddings, with
//!    automatic K selection and nearest-bucket selection at query time.
//! 4. **Context retriever** ([`retrieval`]) — chunking, per-bucket ranking, and assembly of the
//!    context block handed to the LLM.
//! 5. **LLM classifier** ([`llm`]) — prompt construction, the remote call (retried, breaker-
//!    guarded), response parsing, and a keyword/pattern fallback when the model is unavailable.
//! 6. **Rule engine** ([`rules`]) — deterministic condition matching and priority-based conflict
//!    resolution, overriding the model's label when a rule fires.
//! 7. **Confidence calculator** ([`confidence`]) — combines model, similarity, rule, evidence-
//!    quality, and calibration factors into a final confidence and routing decision.
//! 8. **Orchestrator** ([`orchestrator`]) — wires the above into the end-to-end pipeline and
//!    emits the append-only audit trail ([`audit`]).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use verdict_core::{Document, DocumentMetadata, Orchestrator};
//!
//! let document = Document::new_classification("breach of contract notice", DocumentMetadata::default());
//! let result = orchestrator.classify(document).await?;
//! println!("{:?} ({:.2})", result.severity, result.confidence);
//! ```
//!
//! ## Feature flags
//!
//! - `sqlite-store` (default): concrete rusqlite-backed implementations of every `*Store` trait.
//!   Disable to bring your own persistence behind the trait objects in [`store`].

pub mod audit;
pub mod bucket;
pub mod config;
pub mod confidence;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod retrieval;
pub mod retry;
pub mod rules;
pub mod store;

mod breaker;

pub use breaker::{BreakerOpen, CircuitBreaker, CircuitState};

pub use audit::{
    AuditEvent, AuditEventKind, AuditSession, AuditSeverity, BucketEvidenceTrail, DecisionTrail,
    ErrorRecord, LlmResponseSummary, PerformanceMetrics,
};
pub use bucket::{Bucket, BucketEngine, BucketValidationReport};
pub use config::{
    BreakerConfig, ClusteringConfig, ConfidenceConfig, ConfidenceWeights, EmbeddingConfig,
    LlmConfig, PipelineConfig, RetrievalConfig, RetryConfig,
};
pub use confidence::{
    CalibrationCache, CalibrationSample, ConfidenceCalculator, ConfidenceFactors,
    ConfidenceOutcome, ConfidenceWarning, RoutingDecision, WarningLevel, WarningReason,
};
pub use document::{
    content_hash, normalize_text, Document, DocumentMetadata, DocumentRole, Severity,
};
pub use embeddings::{
    Embedding, EmbeddingCache, EmbeddingClient, EmbeddingProvider, HttpEmbeddingProvider, TaskHint,
};
pub use error::{EmbeddingError, LlmError, PipelineError, RuleError, StoreError};
pub use llm::{HttpLlmProvider, InitialRouting, LlmClassifier, LlmProvider, RawClassification};
pub use orchestrator::{ClassificationResult, Deadline, Orchestrator};
pub use retrieval::{chunk_text, Chunk, ClassificationEvidence, ContextBlock, ContextRetriever};
pub use rules::{
    compile_rule, Combinator, CompiledRule, Condition, ConditionValue, ConflictResolution, Field,
    MatchedRule, Operator, Rule, RuleEffectiveness, RuleEngine, RuleVersion,
};
pub use store::{AuditLogStore, BucketStore, ClassificationStore, ReferenceStore, RuleStore};

#[cfg(feature = "sqlite-store")]
pub use store::sqlite::{
    SqliteAuditLog, SqliteBucketStore, SqliteClassificationStore, SqlitePool, SqliteReferenceStore,
    SqliteRuleStore,
};

/// Re-exports the full public surface under one `use verdict_core::prelude::*;`.
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditEventKind, AuditSession, AuditSeverity};
    pub use crate::config::PipelineConfig;
    pub use crate::document::{Document, DocumentMetadata, Severity};
    pub use crate::error::PipelineError;
    pub use crate::orchestrator::{ClassificationResult, Orchestrator};
}
