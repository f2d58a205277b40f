//! Document model - the unit of input to the classification pipeline.
//!
//! A [`Document`] is either a labelled reference example used to build the retrieval corpus,
//! or an unlabelled classification target. See §3 ("Document") and §3.1 ("DocumentMetadata").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Severity tier assigned to a document.
///
/// Ordering is significant: `LOW < MEDIUM < HIGH < CRITICAL`. The rule engine's conflict
/// resolution (§4.6) and the fallback classifier both rely on this ordering to pick the "most
/// restrictive" severity among competing candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All four severities in ascending order.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Parse a severity from its uppercase wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// The uppercase wire representation used in prompts, rule overrides, and audit payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a document is a curated, labelled example or an unlabelled classification target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentRole {
    /// A curated example labelled with severity, used to build the retrieval corpus.
    Reference,
    /// An unlabelled input to be classified.
    Classification,
}

/// Persistence-facing metadata carried alongside a document's text.
///
/// Grounded on `backend/models/legal_models.py` and `backend/storage/firestore_schema.py` in
/// the original source (SPEC_FULL §3.1). Rule conditions address `metadata.filename` and
/// `metadata.tags` directly (§4.6), so these fields are concrete, not part of a free-form map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Original filename, if the document was uploaded from a file.
    pub filename: String,
    /// When the document was uploaded (may differ from `created_at`).
    pub upload_date: DateTime<Utc>,
    /// Size in bytes of the original file, if known.
    pub file_size: u64,
    /// Free-form document type classifier (contract, pleading, correspondence, ...).
    pub document_type: String,
    /// Tags for filtering and rule matching.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Opaque id of the uploading principal, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader_id: Option<String>,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            filename: String::new(),
            upload_date: Utc::now(),
            file_size: 0,
            document_type: "unknown".to_string(),
            tags: Vec::new(),
            uploader_id: None,
        }
    }
}

/// A document in the classification pipeline: either a labelled reference example, or an
/// unlabelled classification target.
///
/// *Invariant:* `role == Reference` implies `severity_label.is_some()`; `role ==
/// Classification` implies `severity_label.is_none()` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Full cleaned text, UTF-8.
    pub text: String,
    /// SHA-256 of the normalized text, used for dedup.
    pub content_hash: String,
    /// Persistence-facing metadata (filename, upload date, tags, ...).
    pub metadata: DocumentMetadata,
    /// Reference vs. classification.
    pub role: DocumentRole,
    /// Severity label; required iff `role == Reference`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_label: Option<Severity>,
    /// When the document was created in the store.
    pub created_at: DateTime<Utc>,
    /// Fixed-dimension embedding vector, values in [-1, 1]. Empty until embedded.
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Normalize text the same way on write and on read so the content hash is stable: trim
/// surrounding whitespace and collapse internal whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of the normalized text, hex-encoded. Used for reference-document dedup (§4.2).
pub fn content_hash(text: &str) -> String {
    let normalized = normalize_text(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

impl Document {
    /// Build a new reference document. Fails the invariant check is the caller's
    /// responsibility: constructing with `role = Reference` and no label is a logic error the
    /// store's `put` will reject.
    pub fn new_reference(text: impl Into<String>, label: Severity, metadata: DocumentMetadata) -> Self {
        let text = text.into();
        let hash = content_hash(&text);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            content_hash: hash,
            metadata,
            role: DocumentRole::Reference,
            severity_label: Some(label),
            created_at: Utc::now(),
            embedding: Vec::new(),
        }
    }

    /// Build a new classification-target document (no label).
    pub fn new_classification(text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        let text = text.into();
        let hash = content_hash(&text);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            content_hash: hash,
            metadata,
            role: DocumentRole::Classification,
            severity_label: None,
            created_at: Utc::now(),
            embedding: Vec::new(),
        }
    }

    /// Check the role/label invariant from §3.
    pub fn check_invariant(&self) -> Result<(), String> {
        match (self.role, &self.severity_label) {
            (DocumentRole::Reference, None) => {
                Err("reference document must carry a severity_label".to_string())
            }
            (DocumentRole::Classification, Some(_)) => {
                Err("classification document must not carry a severity_label".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_is_most_restrictive() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::Low.max(Severity::High), Severity::High);
    }

    #[test]
    fn severity_round_trips_through_str() {
        for s in Severity::ALL {
            assert_eq!(Severity::parse(s.as_str()), Some(s));
        }
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn content_hash_ignores_whitespace_differences() {
        let a = content_hash("Notice   of breach\n\ndated today");
        let b = content_hash("Notice of breach dated today");
        assert_eq!(a, b);
    }

    #[test]
    fn invariant_rejects_reference_without_label() {
        let mut doc = Document::new_classification("text", DocumentMetadata::default());
        doc.role = DocumentRole::Reference;
        assert!(doc.check_invariant().is_err());
    }

    #[test]
    fn invariant_accepts_well_formed_documents() {
        let reference = Document::new_reference("text", Severity::High, DocumentMetadata::default());
        assert!(reference.check_invariant().is_ok());
        let classification = Document::new_classification("text", DocumentMetadata::default());
        assert!(classification.check_invariant().is_ok());
    }
}
