//! Confidence-warning levels, reasons, and routing (§4.7: "Warning evaluation", "Routing").

use serde::{Deserialize, Serialize};

use crate::document::Severity;

/// How suspect a classification's confidence is judged to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// The closed set of reasons a warning may carry (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningReason {
    LowModelConfidence,
    LowChunkSimilarity,
    PoorEvidenceQuality,
    NoRuleSupport,
    ConflictingRules,
    HistoricalInaccuracy,
    ExtremeSeverityPrediction,
    InsufficientContext,
    ModelUncertainty,
    InconsistentEvidence,
}

/// A structured record of why a classification's confidence is suspect, or `None` if it is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceWarning {
    pub level: WarningLevel,
    pub reasons: Vec<WarningReason>,
}

/// The final routing decision (§3: "ClassificationResult").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    AutoAccept,
    HumanReview,
    HumanTriage,
}

/// Inputs needed to evaluate the warning level and accumulate reasons, beyond the already
/// computed factors.
pub struct WarningInputs<'a> {
    pub model_confidence: f64,
    pub chunk_similarity: f64,
    pub evidence_quality: f64,
    pub rule_override_score: f64,
    pub rules_applied: bool,
    pub calibration_factor: f64,
    pub predicted_label: Severity,
    pub evidence_count: usize,
    pub evidence_scores: &'a [f32],
}

/// Evaluate the warning level from final confidence (§4.7: "Warning evaluation").
pub fn warning_level(final_confidence: f64) -> Option<WarningLevel> {
    if final_confidence < 0.3 {
        Some(WarningLevel::Critical)
    } else if final_confidence < 0.5 {
        Some(WarningLevel::High)
    } else if final_confidence < 0.7 {
        Some(WarningLevel::Medium)
    } else if final_confidence < 0.85 {
        Some(WarningLevel::Low)
    } else {
        None
    }
}

/// Accumulate every triggered reason, independent of warning level (§4.7).
pub fn accumulate_reasons(inputs: &WarningInputs<'_>) -> Vec<WarningReason> {
    let mut reasons = Vec::new();

    if inputs.model_confidence < 0.6 {
        reasons.push(WarningReason::LowModelConfidence);
    }
    if inputs.chunk_similarity < 0.5 {
        reasons.push(WarningReason::LowChunkSimilarity);
    }
    if inputs.evidence_quality < 0.4 {
        reasons.push(WarningReason::PoorEvidenceQuality);
    }
    if inputs.rule_override_score < 0.6 {
        if inputs.rules_applied {
            reasons.push(WarningReason::ConflictingRules);
        } else {
            reasons.push(WarningReason::NoRuleSupport);
        }
    }
    if inputs.calibration_factor < 0.8 {
        reasons.push(WarningReason::HistoricalInaccuracy);
    }
    if matches!(inputs.predicted_label, Severity::Critical | Severity::Low) && inputs.model_confidence < 0.8 {
        reasons.push(WarningReason::ExtremeSeverityPrediction);
    }
    if inputs.evidence_count < 2 {
        reasons.push(WarningReason::InsufficientContext);
    }
    if inputs.model_confidence < 0.2 || inputs.model_confidence > 0.98 {
        reasons.push(WarningReason::ModelUncertainty);
    }
    if inputs.evidence_scores.len() >= 2 {
        let min = inputs.evidence_scores.iter().cloned().fold(f32::MAX, f32::min);
        let max = inputs.evidence_scores.iter().cloned().fold(f32::MIN, f32::max);
        if (max - min) > 0.4 {
            reasons.push(WarningReason::InconsistentEvidence);
        }
    }

    reasons
}

/// Derive the final routing decision from the warning level and reasons (§4.7: "Routing").
pub fn route(level: Option<WarningLevel>, reasons: &[WarningReason]) -> RoutingDecision {
    match level {
        None => RoutingDecision::AutoAccept,
        Some(WarningLevel::Critical) => RoutingDecision::HumanTriage,
        Some(WarningLevel::High) => RoutingDecision::HumanReview,
        Some(WarningLevel::Medium) => {
            if reasons.contains(&WarningReason::ExtremeSeverityPrediction) || reasons.len() >= 3 {
                RoutingDecision::HumanReview
            } else {
                RoutingDecision::AutoAccept
            }
        }
        Some(WarningLevel::Low) => RoutingDecision::AutoAccept,
    }
}
