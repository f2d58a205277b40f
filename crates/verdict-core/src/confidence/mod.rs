//! Confidence calculator + warning system (C7, §4.7).

pub mod calibration;
pub mod factors;
pub mod warning;

pub use calibration::{CalibrationCache, CalibrationSample};
pub use factors::ConfidenceFactors;
pub use warning::{ConfidenceWarning, RoutingDecision, WarningLevel, WarningReason};

use crate::config::ConfidenceConfig;
use crate::document::Severity;
use crate::retrieval::ClassificationEvidence;
use crate::rules::MatchedRule;

/// Output of [`ConfidenceCalculator::compute`]: the factor breakdown, the combined confidence,
/// the warning (if any), and the routing decision.
#[derive(Debug, Clone)]
pub struct ConfidenceOutcome {
    pub factors: ConfidenceFactors,
    pub final_confidence: f64,
    pub warning: Option<ConfidenceWarning>,
    pub routing: RoutingDecision,
}

/// Stateful only in that it owns the [`CalibrationCache`]; everything else is pure.
pub struct ConfidenceCalculator {
    config: ConfidenceConfig,
    calibration_cache: CalibrationCache,
}

impl ConfidenceCalculator {
    /// Calibration cache TTL, fixed at one hour regardless of the sample window (§5: "Calibration
    /// cache").
    const CALIBRATION_CACHE_TTL_SECONDS: i64 = 3600;

    pub fn new(config: ConfidenceConfig) -> Self {
        Self {
            calibration_cache: CalibrationCache::new(Self::CALIBRATION_CACHE_TTL_SECONDS),
            config,
        }
    }

    /// Compute the final confidence, warning, and routing decision for one classification.
    ///
    /// `fetch_samples` is called at most once per calibration TTL window (§4.7.S).
    pub async fn compute<F, Fut>(
        &self,
        model_confidence: f64,
        evidence: &[ClassificationEvidence],
        matched_rules: &[MatchedRule],
        applied_rule_ids: &[String],
        predicted_label: Severity,
        fetch_samples: F,
    ) -> ConfidenceOutcome
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Vec<CalibrationSample>>,
    {
        let applied: Vec<&MatchedRule> = matched_rules
            .iter()
            .filter(|m| applied_rule_ids.contains(&m.rule_id))
            .collect();
        let rules_applied = !applied.is_empty();

        let similarity = factors::chunk_similarity_factor(evidence);
        let rules = factors::rule_override_factor(&applied);
        let evidence_quality = factors::evidence_quality_factor(evidence);

        let samples = self.calibration_cache.samples(fetch_samples).await;
        let calibration = calibration::compute_calibration_factor(model_confidence, predicted_label, &samples);

        let factor_set = ConfidenceFactors {
            model: model_confidence,
            similarity,
            rules,
            evidence_quality,
            calibration,
        };
        let final_confidence = factors::combine(factor_set, self.config.weights);

        let level = warning::warning_level(final_confidence);
        let evidence_scores: Vec<f32> = evidence.iter().map(|e| e.similarity).collect();
        let reasons = warning::accumulate_reasons(&warning::WarningInputs {
            model_confidence,
            chunk_similarity: similarity,
            evidence_quality,
            rule_override_score: rules,
            rules_applied,
            calibration_factor: calibration,
            predicted_label,
            evidence_count: evidence.len(),
            evidence_scores: &evidence_scores,
        });
        let routing = warning::route(level, &reasons);

        let warning = level.map(|level| ConfidenceWarning { level, reasons });

        ConfidenceOutcome {
            factors: factor_set,
            final_confidence,
            warning,
            routing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn high_confidence_clean_evidence_auto_accepts() {
        let calculator = ConfidenceCalculator::new(ConfidenceConfig::default());
        let evidence: Vec<ClassificationEvidence> = (0..4)
            .map(|i| ClassificationEvidence {
                source_document_id: format!("doc-{i}"),
                chunk_text: "word ".repeat(50),
                similarity: 0.92,
                bucket_id: "bucket-0".to_string(),
            })
            .collect();
        let outcome = calculator
            .compute(0.95, &evidence, &[], &[], Severity::High, || async { Vec::new() })
            .await;
        assert_eq!(outcome.routing, RoutingDecision::AutoAccept);
        assert!(outcome.warning.is_none());
    }

    #[tokio::test]
    async fn low_confidence_sparse_evidence_triggers_review() {
        let calculator = ConfidenceCalculator::new(ConfidenceConfig::default());
        let evidence = vec![ClassificationEvidence {
            source_document_id: "doc-1".to_string(),
            chunk_text: "short".to_string(),
            similarity: 0.4,
            bucket_id: "bucket-0".to_string(),
        }];
        let outcome = calculator
            .compute(0.55, &evidence, &[], &[], Severity::Critical, || async { Vec::new() })
            .await;
        assert!(outcome.warning.is_some());
        assert_ne!(outcome.routing, RoutingDecision::AutoAccept);
    }
}
