//! Bucket engine operations: build, select, merge, split, validate (§4.3).

use std::collections::{HashMap, HashSet};

use crate::config::ClusteringConfig;
use crate::document::Document;
use crate::embeddings::{clamp_similarity, cosine_similarity, l2_normalize};

use super::kmeans::select_optimal_k;
use super::Bucket;

/// Result of [`BucketEngine::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketValidationReport {
    /// Document ids referenced by a bucket but absent from the reference store.
    pub missing_ids: Vec<String>,
    /// Reference documents that belong to no bucket.
    pub orphan_ids: Vec<String>,
    /// Buckets whose `document_ids.len()` disagrees with `document_count`.
    pub count_mismatches: Vec<String>,
    /// Buckets with zero members (dropped, not actionable centroid-wise).
    pub empty_bucket_ids: Vec<String>,
    /// Document ids that appear in more than one bucket.
    pub duplicate_members: Vec<String>,
}

impl BucketValidationReport {
    pub fn is_clean(&self) -> bool {
        self.missing_ids.is_empty()
            && self.orphan_ids.is_empty()
            && self.count_mismatches.is_empty()
            && self.empty_bucket_ids.is_empty()
            && self.duplicate_members.is_empty()
    }
}

/// Stateless operations over the bucket set. The engine holds no data of its own; callers own
/// the current bucket list (loaded via a `BucketStore`) and pass it in explicitly.
pub struct BucketEngine {
    config: ClusteringConfig,
}

impl BucketEngine {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Full rebuild: cluster every reference document's embedding into K buckets, choosing K
    /// automatically unless `k` is supplied. Documents with an empty embedding are skipped.
    pub fn build_from(&self, documents: &[Document], k: Option<usize>, seed: u64) -> Vec<Bucket> {
        let embedded: Vec<&Document> = documents.iter().filter(|d| !d.embedding.is_empty()).collect();
        if embedded.is_empty() {
            return Vec::new();
        }
        if embedded.len() < self.config.min_k {
            return vec![single_bucket(&embedded)];
        }

        let vectors: Vec<Vec<f32>> = embedded.iter().map(|d| d.embedding.clone()).collect();

        let (chosen_k, assignments, mut centroids) = match k {
            Some(k) => {
                let run = super::kmeans::kmeans(&vectors, k.max(1), &self.config, seed);
                (k.max(1), run.assignments, run.centroids)
            }
            None => match select_optimal_k(&vectors, &self.config, seed) {
                Some(optimal) => (optimal.k, optimal.result.assignments, optimal.result.centroids),
                None => return vec![single_bucket(&embedded)],
            },
        };

        let mut members: Vec<Vec<String>> = vec![Vec::new(); chosen_k];
        for (i, doc) in embedded.iter().enumerate() {
            members[assignments[i]].push(doc.id.clone());
        }

        // Empty clusters are dropped; their would-be members become orphans (§4.3: "Tie-breaks
        // and edges").
        let mut buckets = Vec::new();
        for (idx, ids) in members.into_iter().enumerate() {
            if ids.is_empty() {
                continue;
            }
            l2_normalize(&mut centroids[idx]);
            buckets.push(Bucket::new(format!("bucket-{idx}"), centroids[idx].clone(), ids));
        }
        buckets
    }

    /// Top-k buckets whose similarity to `query_vec` meets `min_sim`, sorted descending.
    pub fn select_relevant<'a>(
        &self,
        query_vec: &[f32],
        buckets: &'a [Bucket],
        top_k: usize,
        min_sim: f32,
    ) -> Vec<(&'a Bucket, f32)> {
        let mut scored: Vec<(&Bucket, f32)> = buckets
            .iter()
            .filter(|b| b.document_count > 0)
            .map(|b| (b, clamp_similarity(cosine_similarity(query_vec, &b.centroid))))
            .filter(|(_, sim)| *sim >= min_sim)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Combine two buckets into one. The merged centroid is a count-weighted mean of the two
    /// input centroids, renormalized; the result is marked stale since it is only an
    /// approximation of the true mean over all members until [`BucketEngine::recompute`] runs.
    pub fn merge(&self, b1: &Bucket, b2: &Bucket) -> Bucket {
        let dims = b1.centroid.len();
        let n1 = b1.document_count.max(1) as f32;
        let n2 = b2.document_count.max(1) as f32;
        let mut centroid = vec![0f32; dims];
        for d in 0..dims {
            centroid[d] = (b1.centroid[d] * n1 + b2.centroid.get(d).copied().unwrap_or(0.0) * n2) / (n1 + n2);
        }
        l2_normalize(&mut centroid);

        let mut document_ids = b1.document_ids.clone();
        document_ids.extend(b2.document_ids.iter().cloned());

        let mut merged = Bucket::new(format!("{}+{}", b1.name, b2.name), centroid, document_ids);
        merged.stale = true;
        merged
    }

    /// Split a bucket into `n` sub-buckets by running K-means over its members' actual
    /// embeddings (looked up from `documents`).
    pub fn split(&self, bucket: &Bucket, documents: &[Document], n: usize, seed: u64) -> Vec<Bucket> {
        let by_id: HashMap<&str, &Document> = documents.iter().map(|d| (d.id.as_str(), d)).collect();
        let members: Vec<&Document> = bucket
            .document_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .filter(|d| !d.embedding.is_empty())
            .collect();

        if members.len() < n.max(1) {
            return vec![bucket.clone()];
        }

        let vectors: Vec<Vec<f32>> = members.iter().map(|d| d.embedding.clone()).collect();
        let run = super::kmeans::kmeans(&vectors, n.max(1), &self.config, seed);

        let mut groups: Vec<Vec<String>> = vec![Vec::new(); n.max(1)];
        for (i, doc) in members.iter().enumerate() {
            groups[run.assignments[i]].push(doc.id.clone());
        }

        let mut centroids = run.centroids;
        groups
            .into_iter()
            .enumerate()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(idx, ids)| {
                l2_normalize(&mut centroids[idx]);
                Bucket::new(format!("{}-{idx}", bucket.name), centroids[idx].clone(), ids)
            })
            .collect()
    }

    /// Recompute a bucket's centroid as the L2-normalized mean of its current members' live
    /// embeddings, clearing the stale flag.
    pub fn recompute(&self, bucket: &mut Bucket, documents: &[Document]) {
        let by_id: HashMap<&str, &Document> = documents.iter().map(|d| (d.id.as_str(), d)).collect();
        let members: Vec<&Document> = bucket
            .document_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .filter(|d| !d.embedding.is_empty())
            .collect();
        if members.is_empty() {
            return;
        }
        let dims = members[0].embedding.len();
        let mut centroid = vec![0f32; dims];
        for doc in &members {
            for d in 0..dims {
                centroid[d] += doc.embedding[d];
            }
        }
        for v in centroid.iter_mut() {
            *v /= members.len() as f32;
        }
        l2_normalize(&mut centroid);
        bucket.centroid = centroid;
        bucket.stale = false;
        bucket.updated_at = chrono::Utc::now();
    }

    /// Validate bucket/document consistency (§4.3: "validate").
    pub fn validate(&self, buckets: &[Bucket], documents: &[Document]) -> BucketValidationReport {
        let known_ids: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let mut report = BucketValidationReport::default();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for bucket in buckets {
            if bucket.document_ids.len() != bucket.document_count {
                report.count_mismatches.push(bucket.id.clone());
            }
            if bucket.document_count == 0 {
                report.empty_bucket_ids.push(bucket.id.clone());
            }
            for id in &bucket.document_ids {
                if !known_ids.contains(id.as_str()) {
                    report.missing_ids.push(id.clone());
                }
                *seen.entry(id.as_str()).or_insert(0) += 1;
            }
        }

        for (id, count) in &seen {
            if *count > 1 {
                report.duplicate_members.push((*id).to_string());
            }
        }

        let bucketed_ids: HashSet<&str> = buckets.iter().flat_map(|b| b.document_ids.iter().map(|s| s.as_str())).collect();
        for doc in documents.iter().filter(|d| d.role == crate::document::DocumentRole::Reference) {
            if !bucketed_ids.contains(doc.id.as_str()) {
                report.orphan_ids.push(doc.id.clone());
            }
        }

        report
    }
}

fn single_bucket(documents: &[&Document]) -> Bucket {
    let dims = documents[0].embedding.len();
    let mut centroid = vec![0f32; dims];
    for doc in documents {
        for d in 0..dims {
            centroid[d] += doc.embedding[d];
        }
    }
    for v in centroid.iter_mut() {
        *v /= documents.len() as f32;
    }
    l2_normalize(&mut centroid);
    Bucket::new("bucket-0", centroid, documents.iter().map(|d| d.id.clone()).collect())
}
