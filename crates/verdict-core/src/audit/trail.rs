//! Decision trail (§4.8: "Decision trail").

use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceFactors;
use crate::document::Severity;
use crate::retrieval::ClassificationEvidence;

/// Per-bucket evidence summary recorded in the trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketEvidenceTrail {
    pub bucket_id: String,
    pub bucket_similarity: f32,
    pub chunks_contributed: usize,
}

/// The raw label/confidence/rationale the LLM classifier produced, before rule overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResponseSummary {
    pub label: Severity,
    pub confidence: f64,
    pub rationale: String,
    pub was_fallback: bool,
}

/// The complete per-classification audit payload (§4.8: "Decision trail") — attached to the
/// `classification_completed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTrail {
    pub document_id: String,
    pub input_summary: String,
    pub selected_bucket_ids: Vec<String>,
    pub bucket_evidence: Vec<BucketEvidenceTrail>,
    pub llm_response: LlmResponseSummary,
    pub evidence: Vec<ClassificationEvidence>,
    pub applied_rule_ids: Vec<String>,
    pub factors: ConfidenceFactors,
    pub final_label: Severity,
    pub final_confidence: f64,
    pub processing_time_ms: u64,
}
