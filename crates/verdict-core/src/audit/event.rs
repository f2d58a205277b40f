//! Audit event model (§3: "AuditEvent", §6: "Audit event kinds").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed enumeration of audit event kinds (§6). Modeled as a tagged variant per the
/// "dynamic duck-typed collections" design note — each kind is a distinct, typed case rather
/// than a string tag on a generic payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    ClassificationStarted,
    ContextRetrieved,
    EvidenceCollected,
    RuleApplied,
    RuleOverride,
    ConfidenceWarning,
    ClassificationCompleted,
    ClassificationFailed,
    ResultStored,
    ReprocessingStarted,
    ReprocessingCompleted,
    BucketCreated,
    BucketUpdated,
    RuleCreated,
    RuleUpdated,
    RuleDeleted,
    SystemError,
}

/// Audit event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// An unexpected failure recorded on an audit event (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Per-operation timing attached to an audit event (§3.1, grounded on
/// `backend/performance/performance_tracker.py`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub operation_name: String,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A single, append-only audit record (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: String,
    pub kind: AuditEventKind,
    pub severity: AuditSeverity,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Groups every event emitted during one pipeline run (§5: "Ordering guarantees").
    pub session_id: String,
    /// Emission sequence within `session_id`, used as the tie-break for monotonic ordering when
    /// two events share a timestamp (§5).
    pub sequence: u64,
    /// Free-form, JSON-serializable details — an escape hatch for schema evolution, not the
    /// primary payload (§9: "Dynamic duck-typed collections").
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_trail: Option<super::trail::DecisionTrail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMetrics>,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, severity: AuditSeverity, session_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            severity,
            occurred_at: Utc::now(),
            document_id: None,
            classification_id: None,
            bucket_id: None,
            rule_id: None,
            session_id: session_id.into(),
            sequence,
            details: serde_json::Value::Null,
            decision_trail: None,
            error: None,
            performance: None,
        }
    }
}
