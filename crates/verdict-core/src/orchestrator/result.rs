//! ClassificationResult (§3): the orchestrator's public output type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::confidence::{RoutingDecision, WarningLevel};
use crate::document::Severity;

/// The final, persisted outcome of one classification run (§3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub id: String,
    pub document_id: String,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_level: Option<WarningLevel>,
    pub routing: RoutingDecision,
    pub rationale: String,
    #[serde(default)]
    pub matched_rule_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_reviewed_severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_reviewed_at: Option<DateTime<Utc>>,
}

impl ClassificationResult {
    /// The degraded placeholder emitted for a document whose pipeline run raised an unexpected
    /// error during batch processing (§4.8: "Batch mode").
    pub fn batch_failure(document_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            severity: Severity::Medium,
            confidence: 0.0,
            warning_level: None,
            routing: RoutingDecision::HumanTriage,
            rationale: message.into(),
            matched_rule_ids: Vec::new(),
            created_at: Utc::now(),
            human_reviewed_severity: None,
            human_reviewed_at: None,
        }
    }
}
