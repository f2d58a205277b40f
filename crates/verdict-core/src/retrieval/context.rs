//! Context retriever (C4, §4.4).

use serde::{Deserialize, Serialize};

use crate::bucket::{Bucket, BucketEngine};
use crate::config::RetrievalConfig;
use crate::document::{Document, Severity};
use crate::embeddings::{cosine_similarity, EmbeddingClient, TaskHint};
use crate::error::{EmbeddingError, StoreError};
use crate::store::ReferenceStore;

use super::chunking::chunk_text;

/// Placeholder bucket id used for the sentinel empty block (§4.4: "Empty selection").
pub const NO_CONTEXT_BUCKET: &str = "none";

/// One piece of evidence fed into confidence scoring (§4.7, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationEvidence {
    pub source_document_id: String,
    pub chunk_text: String,
    pub similarity: f32,
    pub bucket_id: String,
}

/// A scored chunk awaiting assembly, carrying enough source metadata to render and group it.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub source_document_id: String,
    pub source_filename: String,
    pub source_severity: Option<Severity>,
    pub bucket_id: String,
    pub text: String,
    pub similarity: f32,
}

/// Per-bucket summary attached to a [`ContextBlock`] (§4.4: "Assembly").
#[derive(Debug, Clone)]
pub struct BucketSummary {
    pub bucket_id: String,
    pub similarity: f32,
    pub chunks_contributed: usize,
}

/// The assembled retrieval result handed to the LLM classifier.
#[derive(Debug, Clone)]
pub struct ContextBlock {
    pub primary_bucket_id: String,
    pub selected_buckets: Vec<BucketSummary>,
    pub chunks: Vec<RankedChunk>,
}

impl ContextBlock {
    fn empty() -> Self {
        Self {
            primary_bucket_id: NO_CONTEXT_BUCKET.to_string(),
            selected_buckets: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Render the LLM-facing text: chunks grouped by source severity, ordered
    /// CRITICAL → HIGH → MEDIUM → LOW, each truncated to 300 characters (§4.4: "Assembly").
    pub fn render(&self) -> String {
        if self.chunks.is_empty() {
            return "No relevant context was found in the reference corpus.".to_string();
        }
        let mut rendered = String::new();
        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
            let group: Vec<&RankedChunk> = self
                .chunks
                .iter()
                .filter(|c| c.source_severity == Some(severity))
                .collect();
            if group.is_empty() {
                continue;
            }
            rendered.push_str(&format!("[{}]\n", severity.as_str()));
            for chunk in group {
                let truncated = truncate_for_display(&chunk.text, 300);
                rendered.push_str(&format!(
                    "- ({}, score={:.2}) {}\n",
                    chunk.source_filename, chunk.similarity, truncated
                ));
            }
        }
        if rendered.is_empty() {
            "No relevant context was found in the reference corpus.".to_string()
        } else {
            rendered
        }
    }

    pub fn evidence(&self) -> Vec<ClassificationEvidence> {
        self.chunks
            .iter()
            .map(|c| ClassificationEvidence {
                source_document_id: c.source_document_id.clone(),
                chunk_text: c.text.clone(),
                similarity: c.similarity,
                bucket_id: c.bucket_id.clone(),
            })
            .collect()
    }
}

fn truncate_for_display(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}... [truncated]")
}

/// Assembles [`ContextBlock`]s from the current bucket set and reference corpus (C4, §4.4).
pub struct ContextRetriever {
    config: RetrievalConfig,
}

impl ContextRetriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Run the full selection + assembly pipeline for one query document.
    #[tracing::instrument(skip(self, embeddings, reference_store, bucket_engine, buckets, query_embedding))]
    pub async fn retrieve(
        &self,
        query_embedding: &[f32],
        buckets: &[Bucket],
        embeddings: &EmbeddingClient,
        reference_store: &dyn ReferenceStore,
        bucket_engine: &BucketEngine,
    ) -> Result<ContextBlock, ContextError> {
        let selected = bucket_engine.select_relevant(
            query_embedding,
            buckets,
            self.config.top_k_buckets,
            self.config.min_bucket_similarity,
        );
        if selected.is_empty() {
            tracing::info!("no buckets met the minimum similarity threshold; returning empty context");
            return Ok(ContextBlock::empty());
        }

        let per_bucket_budget = (self.config.max_context_chunks / selected.len()).max(1);
        let mut all_chunks: Vec<RankedChunk> = Vec::new();
        let mut summaries = Vec::with_capacity(selected.len());

        for (bucket, bucket_similarity) in &selected {
            let documents = reference_store.get_many(&bucket.document_ids).await?;
            let mut bucket_chunks: Vec<RankedChunk> = Vec::new();

            for document in &documents {
                for chunk in chunk_text(&document.text, self.config.chunk_size, self.config.chunk_overlap) {
                    if chunk.text.is_empty() {
                        continue;
                    }
                    let chunk_vector = self.embed_chunk(&chunk.text, document, embeddings).await?;
                    let similarity = cosine_similarity(query_embedding, &chunk_vector);
                    bucket_chunks.push(RankedChunk {
                        source_document_id: document.id.clone(),
                        source_filename: document.metadata.filename.clone(),
                        source_severity: document.severity_label,
                        bucket_id: bucket.id.clone(),
                        text: chunk.text,
                        similarity,
                    });
                }
            }

            bucket_chunks.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
            bucket_chunks.truncate(per_bucket_budget);

            summaries.push(BucketSummary {
                bucket_id: bucket.id.clone(),
                similarity: *bucket_similarity,
                chunks_contributed: bucket_chunks.len(),
            });
            all_chunks.extend(bucket_chunks);
        }

        all_chunks.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        all_chunks.truncate(self.config.max_context_chunks);

        let primary_bucket_id = selected
            .first()
            .map(|(b, _)| b.id.clone())
            .unwrap_or_else(|| NO_CONTEXT_BUCKET.to_string());

        Ok(ContextBlock {
            primary_bucket_id,
            selected_buckets: summaries,
            chunks: all_chunks,
        })
    }

    /// Reuse the document's own stored embedding as a stand-in for the chunk embedding when the
    /// document is short enough to fit in one chunk; otherwise embed the chunk with a `query`
    /// hint (§4.4: "reuse cached document embeddings when available").
    async fn embed_chunk(&self, chunk: &str, document: &Document, embeddings: &EmbeddingClient) -> Result<Vec<f32>, ContextError> {
        if !document.embedding.is_empty() && chunk.trim() == document.text.trim() {
            return Ok(document.embedding.clone());
        }
        Ok(embeddings.embed(chunk, TaskHint::Query).await?)
    }
}

/// Error surfaced by [`ContextRetriever::retrieve`].
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}
