//! Persistence traits (C2, §4.2, §6: "Persistence layout").
//!
//! Every store is a narrow, async trait over a logical collection. The `sqlite-store` feature
//! provides concrete SQLite-backed implementations in [`sqlite`]; the orchestrator only ever
//! depends on these traits, so an in-memory or alternative backend can be swapped in for tests.

pub mod migrations;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::AuditEvent;
use crate::bucket::Bucket;
use crate::document::Document;
use crate::error::StoreError;
use crate::orchestrator::ClassificationResult;
use crate::rules::{Rule, RuleEffectiveness, RuleVersion};

/// The reference-document corpus (§4.2: "ReferenceStore").
///
/// *Invariant:* `put` rejects a document whose `content_hash` already exists (§4.2: "Duplicate
/// detection") — callers that want idempotent re-upload should call `find_by_hash` first.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn put(&self, document: Document) -> Result<Document, StoreError>;
    async fn get(&self, id: &str) -> Result<Document, StoreError>;
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Document>, StoreError>;
    async fn list_references(&self) -> Result<Vec<Document>, StoreError>;
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Document>, StoreError>;
    /// Assign a document to a bucket (or clear its assignment with `None`) after clustering.
    async fn set_bucket(&self, document_id: &str, bucket_id: Option<&str>) -> Result<(), StoreError>;
}

/// Semantic bucket persistence (§4.3: "Bucket engine").
#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn put(&self, bucket: Bucket) -> Result<Bucket, StoreError>;
    async fn get(&self, id: &str) -> Result<Bucket, StoreError>;
    async fn list(&self) -> Result<Vec<Bucket>, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

/// Rule persistence with append-only version history and effectiveness tracking (§4.6.S).
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn put(&self, rule: Rule, change_description: &str, author: Option<&str>) -> Result<Rule, StoreError>;
    async fn get(&self, id: &str) -> Result<Rule, StoreError>;
    async fn list_active(&self) -> Result<Vec<Rule>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Rule>, StoreError>;
    async fn deactivate(&self, id: &str) -> Result<(), StoreError>;
    async fn versions(&self, rule_id: &str) -> Result<Vec<RuleVersion>, StoreError>;
    async fn effectiveness(&self, rule_id: &str) -> Result<RuleEffectiveness, StoreError>;
    /// Fold in the outcome of one application of `rule_id` (§4.6: "Effectiveness tracking").
    async fn record_application(&self, rule_id: &str, confidence_delta: f64, upheld: bool) -> Result<(), StoreError>;
    /// Record a human reviewer's verdict on a rule-influenced classification, feeding back into
    /// `successful_overrides` (§9: open question "human review feedback loop").
    async fn record_human_review_outcome(&self, rule_id: &str, upheld: bool) -> Result<(), StoreError>;
}

/// Classification result persistence, plus the calibration sample source (§4.7.S, §4.8).
#[async_trait]
pub trait ClassificationStore: Send + Sync {
    async fn put(&self, result: ClassificationResult) -> Result<ClassificationResult, StoreError>;
    async fn get(&self, id: &str) -> Result<ClassificationResult, StoreError>;
    async fn get_for_document(&self, document_id: &str) -> Result<Option<ClassificationResult>, StoreError>;
    /// Classifications completed within `since`, used to build calibration samples (§4.7.S).
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<ClassificationResult>, StoreError>;
    async fn record_human_review(&self, id: &str, reviewed_severity: crate::document::Severity) -> Result<(), StoreError>;
}

/// Append-only audit log persistence (§3, §6).
#[async_trait]
pub trait AuditLogStore: Send + Sync {
    async fn append(&self, event: AuditEvent) -> Result<(), StoreError>;
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<AuditEvent>, StoreError>;
}
