//! The five confidence factors and their combination (§4.7: "Factor computation",
//! "Combination").

use serde::{Deserialize, Serialize};

use crate::config::ConfidenceWeights;
use crate::retrieval::ClassificationEvidence;
use crate::rules::MatchedRule;

/// The five numeric confidence components (§3: "ConfidenceFactors").
///
/// *Invariant:* all fields except `calibration` lie in `[0, 1]`; `calibration` lies in
/// `[0.5, 1.5]` (a multiplicative adjustment, not a weighted summand in the usual sense).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceFactors {
    pub model: f64,
    pub similarity: f64,
    pub rules: f64,
    pub evidence_quality: f64,
    pub calibration: f64,
}

/// Weighted mean of evidence similarity scores, weights `exp(2*score)` so high-similarity
/// chunks dominate. Empty evidence ⇒ 0 (§4.7).
pub fn chunk_similarity_factor(evidence: &[ClassificationEvidence]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for e in evidence {
        let score = e.similarity as f64;
        let weight = (2.0 * score).exp();
        weighted_sum += weight * score;
        weight_total += weight;
    }
    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

/// No rules applied ⇒ neutral 0.5. Otherwise
/// `0.5 + 0.5*(0.6*priority_norm + 0.4*specificity_norm)` (§4.7).
pub fn rule_override_factor(applied: &[&MatchedRule]) -> f64 {
    if applied.is_empty() {
        return 0.5;
    }
    let n = applied.len() as f64;
    let priority_norm = applied.iter().map(|r| r.priority as f64).sum::<f64>() / (100.0 * n);
    let avg_conditions = applied.iter().map(|r| r.condition_count as f64).sum::<f64>() / n;
    let specificity_norm = (avg_conditions / 5.0).min(1.0);
    0.5 + 0.5 * (0.6 * priority_norm + 0.4 * specificity_norm)
}

fn quantity_sub_factor(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    if n < 3 {
        n as f64 / 3.0
    } else if n <= 5 {
        1.0
    } else {
        (1.0 - 0.1 * (n - 5) as f64).max(0.7)
    }
}

fn diversity_sub_factor(evidence: &[ClassificationEvidence]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    let unique_docs: std::collections::HashSet<&str> = evidence.iter().map(|e| e.source_document_id.as_str()).collect();
    let unique_buckets: std::collections::HashSet<&str> = evidence.iter().map(|e| e.bucket_id.as_str()).collect();
    (unique_docs.len() + unique_buckets.len()) as f64 / (evidence.len() as f64 + 2.0)
}

fn length_sub_factor(evidence: &[ClassificationEvidence]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    let avg_words = evidence
        .iter()
        .map(|e| e.chunk_text.split_whitespace().count() as f64)
        .sum::<f64>()
        / evidence.len() as f64;
    if avg_words < 10.0 {
        avg_words / 10.0
    } else if avg_words <= 200.0 {
        1.0
    } else {
        (1.0 - (avg_words - 200.0) / 400.0).max(0.5)
    }
}

fn consistency_sub_factor(evidence: &[ClassificationEvidence]) -> f64 {
    if evidence.len() < 2 {
        return 1.0;
    }
    let scores: Vec<f64> = evidence.iter().map(|e| e.similarity as f64).collect();
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    let stddev = variance.sqrt();
    (1.0 - 2.0 * stddev).max(0.0)
}

/// Weighted sum of the four evidence-quality sub-factors (§4.7: "Evidence quality").
pub fn evidence_quality_factor(evidence: &[ClassificationEvidence]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    0.3 * quantity_sub_factor(evidence.len())
        + 0.25 * diversity_sub_factor(evidence)
        + 0.25 * length_sub_factor(evidence)
        + 0.2 * consistency_sub_factor(evidence)
}

/// Combine the five factors into the final confidence, per §4.7: "Combination".
///
/// `weighted_sum = w_model·model + w_sim·sim + w_rules·rules + w_evq·evq + w_cal·cal_factor`,
/// then `final = clamp01(weighted_sum · cal_factor)` — the calibration factor is folded into the
/// weighted sum as a summand *and* applied multiplicatively to the whole expression, exactly as
/// specified.
pub fn combine(factors: ConfidenceFactors, weights: ConfidenceWeights) -> f64 {
    let weighted_sum = weights.model * factors.model
        + weights.similarity * factors.similarity
        + weights.rules * factors.rules
        + weights.evidence_quality * factors.evidence_quality
        + weights.calibration * factors.calibration;
    (weighted_sum * factors.calibration).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(score: f32, doc: &str, bucket: &str, words: usize) -> ClassificationEvidence {
        ClassificationEvidence {
            source_document_id: doc.to_string(),
            chunk_text: "word ".repeat(words),
            similarity: score,
            bucket_id: bucket.to_string(),
        }
    }

    #[test]
    fn chunk_similarity_factor_is_zero_for_empty_evidence() {
        assert_eq!(chunk_similarity_factor(&[]), 0.0);
    }

    #[test]
    fn chunk_similarity_factor_favors_high_similarity_chunks() {
        let evidence = vec![evidence(0.9, "a", "b1", 50), evidence(0.1, "b", "b1", 50)];
        let factor = chunk_similarity_factor(&evidence);
        assert!(factor > 0.7);
    }

    #[test]
    fn rule_override_factor_is_neutral_without_applied_rules() {
        assert_eq!(rule_override_factor(&[]), 0.5);
    }

    #[test]
    fn evidence_quality_rewards_diverse_moderate_length_evidence() {
        let evidence = vec![evidence(0.8, "a", "b1", 50), evidence(0.8, "b", "b2", 60), evidence(0.8, "c", "b3", 55)];
        let factor = evidence_quality_factor(&evidence);
        assert!(factor > 0.5 && factor <= 1.0);
    }

    #[test]
    fn combine_clamps_to_unit_interval() {
        let factors = ConfidenceFactors {
            model: 1.0,
            similarity: 1.0,
            rules: 1.0,
            evidence_quality: 1.0,
            calibration: 1.5,
        };
        let weights = ConfidenceWeights::default().normalized();
        let combined = combine(factors, weights);
        assert!(combined <= 1.0);
    }
}
