//! Embedding vector type and similarity functions.
//!
//! Grounded on the teacher crate's `embeddings/local.rs`: the same `Embedding` wrapper and
//! cosine/euclidean/dot-product helpers, adapted from a local ONNX model's output to a remote
//! provider's JSON response.

use serde::{Deserialize, Serialize};

/// Which side of a retrieval call the text plays — affects how some providers embed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskHint {
    /// Text being indexed into the corpus (a reference document or chunk).
    Document,
    /// Text being used to query the corpus (a classification document or search term).
    Query,
}

impl TaskHint {
    /// The wire value sent to the remote provider (§6: `task_type`).
    pub fn wire_value(&self) -> &'static str {
        match self {
            TaskHint::Document => "retrieval_document",
            TaskHint::Query => "retrieval_query",
        }
    }
}

/// A fixed-dimension embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Cosine similarity with another embedding, clamped to [0, 1] per §4.1 ("never negative,
    /// never >1").
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        clamp_similarity(cosine_similarity(&self.vector, &other.vector))
    }

    /// L2-normalize in place.
    pub fn normalize(&mut self) {
        l2_normalize(&mut self.vector);
    }
}

/// L2-normalize a vector in place. No-op on a zero vector.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Raw cosine similarity between two vectors, in [-1, 1]. Returns 0.0 on dimension mismatch or
/// a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot = dot_product(a, b);
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// Clamp a raw cosine similarity to [0, 1] for downstream use (§4.1).
pub fn clamp_similarity(sim: f32) -> f32 {
    sim.clamp(0.0, 1.0)
}

/// Dot product of two equal-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn clamp_similarity_never_negative_or_above_one() {
        assert_eq!(clamp_similarity(-0.5), 0.0);
        assert_eq!(clamp_similarity(1.5), 1.0);
        assert!((clamp_similarity(0.42) - 0.42).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_yield_zero_similarity() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn l2_normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
