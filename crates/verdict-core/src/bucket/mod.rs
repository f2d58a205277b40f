//! Bucket engine (C3, §4.3): organizes the reference corpus into semantic buckets.

pub mod engine;
pub mod kmeans;

pub use engine::{BucketEngine, BucketValidationReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A semantic cluster of reference documents.
///
/// *Invariant:* `document_ids.len() == document_count`, and the centroid equals the
/// L2-normalized mean of the member embeddings as of `updated_at` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: String,
    pub centroid: Vec<f32>,
    pub document_ids: Vec<String>,
    pub document_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when a member was added/removed since the centroid was last recomputed (§4.3:
    /// "Centroid maintenance"). Stale buckets remain usable — selection is approximate, never
    /// incorrect.
    #[serde(default)]
    pub stale: bool,
}

impl Bucket {
    pub fn new(name: impl Into<String>, centroid: Vec<f32>, document_ids: Vec<String>) -> Self {
        let now = Utc::now();
        let document_count = document_ids.len();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            centroid,
            document_ids,
            document_count,
            description: None,
            created_at: now,
            updated_at: now,
            stale: false,
        }
    }

    pub fn check_invariant(&self) -> Result<(), String> {
        if self.document_ids.len() != self.document_count {
            return Err(format!(
                "bucket {} has {} document_ids but document_count {}",
                self.id,
                self.document_ids.len(),
                self.document_count
            ));
        }
        Ok(())
    }
}
