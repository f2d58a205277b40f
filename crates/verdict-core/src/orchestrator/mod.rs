//! Orchestrator + audit trail (C8, §4.8): wires C1-C7 into the end-to-end classification
//! pipeline and owns every shared resource named in §5.

pub mod result;

pub use result::ClassificationResult;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::audit::{
    AuditEvent, AuditEventKind, AuditSession, AuditSeverity, BucketEvidenceTrail, DecisionTrail,
    ErrorRecord, LlmResponseSummary, PerformanceMetrics,
};
use crate::bucket::{Bucket, BucketEngine};
use crate::config::PipelineConfig;
use crate::confidence::{CalibrationSample, ConfidenceCalculator};
use crate::document::Document;
use crate::embeddings::{EmbeddingClient, TaskHint};
use crate::error::PipelineError;
use crate::llm::LlmClassifier;
use crate::retrieval::ContextRetriever;
use crate::rules::{compile_rule, CompiledRule, RuleEngine};
use crate::store::{AuditLogStore, BucketStore, ClassificationStore, ReferenceStore, RuleStore};

const BATCH_INTER_DOCUMENT_DELAY_MS: u64 = 100;
const REPROCESS_FRESHNESS_WINDOW_HOURS: i64 = 1;

/// An optional outer deadline for one classification call (§5: "Cancellation & timeouts"). Each
/// remote call still carries its own per-call timeout ([`crate::config::EmbeddingConfig::timeout`],
/// [`crate::config::LlmConfig::timeout`], ...); a `Deadline` races the whole in-flight call
/// against the time remaining *across* the pipeline, so a caller can bound total latency even
/// when every individual call is within its own budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No outer deadline: remote calls run under their own per-call timeouts only.
    pub fn none() -> Self {
        Deadline(None)
    }

    /// A deadline `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Deadline(Some(Instant::now() + duration))
    }

    fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// Race `fut` against `deadline`'s remaining time, if any. Grounded on the teacher pack's
/// `harborgrid-justin-caddy/src/scheduling/scheduler.rs` job-execution timeout, which wraps
/// `tokio::time::timeout` around the awaited future the same way.
async fn race_deadline<T>(deadline: Deadline, started: Instant, fut: impl std::future::Future<Output = T>) -> Result<T, PipelineError> {
    match deadline.remaining() {
        None => Ok(fut.await),
        Some(remaining) => tokio::time::timeout(remaining, fut).await.map_err(|_| PipelineError::DeadlineExceeded {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    }
}

/// Owns the embedding client, LLM classifier, bucket/rule/confidence engines, and every store
/// handle, constructed once per deployment (§4.8.S: "no statics/OnceLock for these").
pub struct Orchestrator {
    config: PipelineConfig,
    embeddings: EmbeddingClient,
    llm: LlmClassifier,
    context_retriever: ContextRetriever,
    bucket_engine: BucketEngine,
    rule_engine: RuleEngine,
    confidence: ConfidenceCalculator,
    reference_store: Arc<dyn ReferenceStore>,
    bucket_store: Arc<dyn BucketStore>,
    rule_store: Arc<dyn RuleStore>,
    classification_store: Arc<dyn ClassificationStore>,
    audit_store: Arc<dyn AuditLogStore>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineConfig,
        embeddings: EmbeddingClient,
        llm: LlmClassifier,
        reference_store: Arc<dyn ReferenceStore>,
        bucket_store: Arc<dyn BucketStore>,
        rule_store: Arc<dyn RuleStore>,
        classification_store: Arc<dyn ClassificationStore>,
        audit_store: Arc<dyn AuditLogStore>,
    ) -> Self {
        Self {
            context_retriever: ContextRetriever::new(config.retrieval.clone()),
            bucket_engine: BucketEngine::new(config.clustering.clone()),
            rule_engine: RuleEngine::new(),
            confidence: ConfidenceCalculator::new(config.confidence),
            embeddings,
            llm,
            reference_store,
            bucket_store,
            rule_store,
            classification_store,
            audit_store,
            config,
        }
    }

    /// Classify a single document end-to-end (§4.8: "Pipeline"), with no outer deadline beyond
    /// each call's own per-call timeout.
    pub async fn classify(&self, document: Document) -> Result<ClassificationResult, PipelineError> {
        self.classify_with_deadline(document, Deadline::none()).await
    }

    /// Classify a single document, cancelling in-flight remote calls and failing with
    /// [`PipelineError::DeadlineExceeded`] if `deadline` expires first (§5: "Cancellation &
    /// timeouts").
    #[tracing::instrument(skip(self, document), fields(document_id = %document.id))]
    pub async fn classify_with_deadline(&self, document: Document, deadline: Deadline) -> Result<ClassificationResult, PipelineError> {
        let started = Instant::now();
        let buckets = race_deadline(deadline, started, self.bucket_store.list()).await??;
        self.classify_with_buckets(document, &buckets, deadline).await
    }

    /// Classify N documents, loading the bucket list once and spreading remote load with a small
    /// inter-document delay (§4.8: "Batch mode"). A per-document failure never aborts the batch.
    pub async fn classify_batch(&self, documents: Vec<Document>) -> Result<Vec<ClassificationResult>, PipelineError> {
        self.classify_batch_with_deadline(documents, Deadline::none()).await
    }

    /// Batch variant of [`Self::classify_with_deadline`]: `deadline`, if set, is shared across
    /// every document in the batch rather than reset per document, matching the "outer deadline"
    /// framing in §5.
    pub async fn classify_batch_with_deadline(
        &self,
        documents: Vec<Document>,
        deadline: Deadline,
    ) -> Result<Vec<ClassificationResult>, PipelineError> {
        let started = Instant::now();
        let buckets = race_deadline(deadline, started, self.bucket_store.list()).await??;
        let mut results = Vec::with_capacity(documents.len());

        for (i, document) in documents.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(BATCH_INTER_DOCUMENT_DELAY_MS)).await;
            }
            let document_id = document.id.clone();
            match self.classify_with_buckets(document, &buckets, deadline).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::warn!(document_id, error = %err, "classification failed during batch; emitting fallback result");
                    results.push(ClassificationResult::batch_failure(document_id, err.to_string()));
                }
            }
        }

        Ok(results)
    }

    /// Reprocess a previously classified document (§4.8: "Reprocessing"). Returns the cached
    /// result unchanged unless `force` or the result is at least one hour old.
    pub async fn reprocess(&self, classification_id: &str, force: bool) -> Result<ClassificationResult, PipelineError> {
        self.reprocess_with_deadline(classification_id, force, Deadline::none()).await
    }

    /// Deadline-aware variant of [`Self::reprocess`].
    pub async fn reprocess_with_deadline(
        &self,
        classification_id: &str,
        force: bool,
        deadline: Deadline,
    ) -> Result<ClassificationResult, PipelineError> {
        let started = Instant::now();
        let previous = self.classification_store.get(classification_id).await?;
        let age = Utc::now() - previous.created_at;
        if !force && age < chrono::Duration::hours(REPROCESS_FRESHNESS_WINDOW_HOURS) {
            return Ok(previous);
        }

        let session = AuditSession::new();
        self.emit(&session, AuditEventKind::ReprocessingStarted, AuditSeverity::Info, |e| {
            e.document_id = Some(previous.document_id.clone());
            e.classification_id = Some(classification_id.to_string());
        })
        .await;

        let document = race_deadline(deadline, started, self.reference_store.get(&previous.document_id)).await??;
        let buckets = race_deadline(deadline, started, self.bucket_store.list()).await??;
        let fresh = self.classify_with_buckets(document, &buckets, deadline).await?;

        self.emit(&session, AuditEventKind::ReprocessingCompleted, AuditSeverity::Info, |e| {
            e.document_id = Some(previous.document_id.clone());
            e.classification_id = Some(fresh.id.clone());
            e.details = serde_json::json!({
                "old_label": previous.severity.as_str(),
                "new_label": fresh.severity.as_str(),
                "confidence_delta": fresh.confidence - previous.confidence,
            });
        })
        .await;

        Ok(fresh)
    }

    async fn classify_with_buckets(&self, mut document: Document, buckets: &[Bucket], deadline: Deadline) -> Result<ClassificationResult, PipelineError> {
        let session = AuditSession::new();
        let started = Instant::now();

        self.emit(&session, AuditEventKind::ClassificationStarted, AuditSeverity::Info, |e| {
            e.document_id = Some(document.id.clone());
        })
        .await;

        match self.run_pipeline(&mut document, buckets, &session, started, deadline).await {
            Ok(result) => Ok(result),
            Err(err) => {
                let cancelled = matches!(err, PipelineError::DeadlineExceeded { .. });
                self.emit(&session, AuditEventKind::ClassificationFailed, AuditSeverity::Error, |e| {
                    e.document_id = Some(document.id.clone());
                    e.error = Some(ErrorRecord {
                        error_type: if cancelled { "DeadlineExceeded".to_string() } else { "PipelineError".to_string() },
                        message: err.to_string(),
                        context: cancelled.then(|| "cancellation".to_string()),
                    });
                    e.performance = Some(PerformanceMetrics {
                        operation_name: "classify".to_string(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        success: false,
                        metadata: Default::default(),
                    });
                })
                .await;
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        document: &mut Document,
        buckets: &[Bucket],
        session: &AuditSession,
        started: Instant,
        deadline: Deadline,
    ) -> Result<ClassificationResult, PipelineError> {
        if document.embedding.is_empty() {
            document.embedding = race_deadline(deadline, started, self.embeddings.embed(&document.text, TaskHint::Query)).await??;
        }

        let context = race_deadline(
            deadline,
            started,
            self.context_retriever.retrieve(&document.embedding, buckets, &self.embeddings, self.reference_store.as_ref(), &self.bucket_engine),
        )
        .await?
        .map_err(|e| PipelineError::Internal(e.to_string()))?;

        self.emit(session, AuditEventKind::EvidenceCollected, AuditSeverity::Info, |e| {
            e.document_id = Some(document.id.clone());
            e.details = serde_json::json!({
                "selected_buckets": context
                    .selected_buckets
                    .iter()
                    .map(|b| serde_json::json!({
                        "bucketId": b.bucket_id,
                        "similarity": b.similarity,
                        "chunksContributed": b.chunks_contributed,
                    }))
                    .collect::<Vec<_>>(),
            });
        })
        .await;
        self.emit(session, AuditEventKind::ContextRetrieved, AuditSeverity::Info, |e| {
            e.document_id = Some(document.id.clone());
            e.bucket_id = Some(context.primary_bucket_id.clone());
            e.details = serde_json::json!({ "chunkCount": context.chunks.len() });
        })
        .await;

        let rendered_context = context.render();
        let raw = race_deadline(deadline, started, self.llm.classify(document, &rendered_context)).await?;

        let mut evidence = context.evidence();
        evidence.extend(raw.fallback_evidence.iter().cloned());

        let active_rules = match race_deadline(deadline, started, self.rule_store.list_active()).await? {
            Ok(rules) => rules,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load active rules; classifying without overrides");
                Vec::new()
            }
        };
        let compiled: Vec<CompiledRule> = active_rules.into_iter().map(compile_rule).collect();
        let matched = self.rule_engine.evaluate(&compiled, document);
        let resolution = self.rule_engine.resolve_conflicts(&matched);

        let (final_label, applied_rule_ids) = match &resolution {
            Some(res) => (res.chosen_severity, res.applied_rule_ids.clone()),
            None => (raw.label, Vec::new()),
        };

        for rule_id in &applied_rule_ids {
            self.emit(session, AuditEventKind::RuleApplied, AuditSeverity::Info, |e| {
                e.document_id = Some(document.id.clone());
                e.rule_id = Some(rule_id.clone());
            })
            .await;
        }
        if !applied_rule_ids.is_empty() && final_label != raw.label {
            self.emit(session, AuditEventKind::RuleOverride, AuditSeverity::Info, |e| {
                e.document_id = Some(document.id.clone());
                e.details = serde_json::json!({
                    "from": raw.label.as_str(),
                    "to": final_label.as_str(),
                    "ruleIds": applied_rule_ids,
                });
            })
            .await;
        }

        let classification_store = Arc::clone(&self.classification_store);
        let calibration_window_days = self.config.confidence.calibration_window_days;
        let outcome = self
            .confidence
            .compute(raw.confidence, &evidence, &matched, &applied_rule_ids, final_label, || async move {
                fetch_calibration_samples(classification_store.as_ref(), calibration_window_days).await
            })
            .await;

        if let Some(warning) = &outcome.warning {
            self.emit(session, AuditEventKind::ConfidenceWarning, AuditSeverity::Warning, |e| {
                e.document_id = Some(document.id.clone());
                e.details = serde_json::json!({
                    "level": format!("{:?}", warning.level),
                    "reasons": warning.reasons.iter().map(|r| format!("{:?}", r)).collect::<Vec<_>>(),
                });
            })
            .await;
        }

        let mut rationale = raw.rationale.clone();
        if !applied_rule_ids.is_empty() {
            rationale.push_str(&format!(" Rule Overrides Applied: {}", applied_rule_ids.join(", ")));
        }

        let result = ClassificationResult {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            severity: final_label,
            confidence: outcome.final_confidence,
            warning_level: outcome.warning.as_ref().map(|w| w.level),
            routing: outcome.routing,
            rationale,
            matched_rule_ids: applied_rule_ids.clone(),
            created_at: Utc::now(),
            human_reviewed_severity: None,
            human_reviewed_at: None,
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        let trail = DecisionTrail {
            document_id: document.id.clone(),
            input_summary: document.text.chars().take(200).collect(),
            selected_bucket_ids: context.selected_buckets.iter().map(|b| b.bucket_id.clone()).collect(),
            bucket_evidence: context
                .selected_buckets
                .iter()
                .map(|b| BucketEvidenceTrail {
                    bucket_id: b.bucket_id.clone(),
                    bucket_similarity: b.similarity,
                    chunks_contributed: b.chunks_contributed,
                })
                .collect(),
            llm_response: LlmResponseSummary {
                label: raw.label,
                confidence: raw.confidence,
                rationale: raw.rationale.clone(),
                was_fallback: raw.was_fallback,
            },
            evidence,
            applied_rule_ids,
            factors: outcome.factors,
            final_label,
            final_confidence: outcome.final_confidence,
            processing_time_ms,
        };

        match self.classification_store.put(result.clone()).await {
            Ok(_) => {
                self.emit(session, AuditEventKind::ResultStored, AuditSeverity::Info, |e| {
                    e.document_id = Some(document.id.clone());
                    e.classification_id = Some(result.id.clone());
                })
                .await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to persist classification result; returning it to the caller anyway");
            }
        }

        self.emit(session, AuditEventKind::ClassificationCompleted, AuditSeverity::Info, |e| {
            e.document_id = Some(document.id.clone());
            e.classification_id = Some(result.id.clone());
            e.performance = Some(PerformanceMetrics {
                operation_name: "classify".to_string(),
                duration_ms: processing_time_ms,
                success: true,
                metadata: Default::default(),
            });
            e.decision_trail = Some(trail.clone());
        })
        .await;

        Ok(result)
    }

    async fn emit<F>(&self, session: &AuditSession, kind: AuditEventKind, severity: AuditSeverity, build: F)
    where
        F: FnOnce(&mut AuditEvent),
    {
        let mut event = session.next_event(kind, severity);
        build(&mut event);
        if let Err(err) = self.audit_store.append(event).await {
            tracing::warn!(error = %err, ?kind, "failed to persist audit event");
        }
    }
}

async fn fetch_calibration_samples(store: &dyn ClassificationStore, window_days: i64) -> Vec<CalibrationSample> {
    let since = Utc::now() - chrono::Duration::days(window_days);
    let results = match store.list_since(since).await {
        Ok(results) => results,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load calibration samples; treating as cold start");
            return Vec::new();
        }
    };
    results
        .into_iter()
        .filter_map(|r| {
            let true_label = r.human_reviewed_severity?;
            Some(CalibrationSample {
                confidence: r.confidence,
                predicted_label: r.severity,
                true_label,
            })
        })
        .collect()
}
