//! Keyword/pattern fallback classifier (§4.5: "Fallback").
//!
//! Grounded on `backend/ai/fallback_classifier.py`'s `KeywordClassifier`: per-severity keyword
//! and regex-pattern tables, weighted scoring, highest score wins. A stateless function taking
//! its keyword tables as an explicit argument, per the "cyclic references" design note in §9 —
//! it must never depend on the primary classifier's failure-path logging.

use regex::Regex;

use crate::document::Severity;
use crate::retrieval::ClassificationEvidence;

/// One severity's keyword/pattern table and scoring weight.
pub struct KeywordTable {
    pub severity: Severity,
    pub keywords: &'static [&'static str],
    pub patterns: &'static [&'static str],
    pub weight: f64,
}

/// Result of a fallback classification.
pub struct FallbackResult {
    pub label: Severity,
    pub confidence: f64,
    pub rationale: String,
    pub evidence: Vec<ClassificationEvidence>,
}

/// The default keyword/pattern tables (§4.5, grounded on the original's hardcoded
/// `severity_keywords` dict).
pub fn default_tables() -> Vec<KeywordTable> {
    vec![
        KeywordTable {
            severity: Severity::Critical,
            keywords: &[
                "immediate termination", "breach of contract", "lawsuit", "litigation",
                "criminal charges", "felony", "fraud", "embezzlement", "bankruptcy",
                "cease and desist", "injunction", "restraining order", "emergency",
                "urgent legal action", "court order", "subpoena", "warrant",
                "class action", "punitive damages", "criminal liability",
            ],
            patterns: &[
                r"must\s+respond\s+within\s+\d+\s+days?",
                r"legal\s+action\s+will\s+be\s+taken",
                r"violation\s+of\s+federal\s+law",
                r"criminal\s+prosecution",
                r"immediate\s+compliance\s+required",
            ],
            weight: 1.0,
        },
        KeywordTable {
            severity: Severity::High,
            keywords: &[
                "contract violation", "breach", "default", "non-compliance",
                "penalty", "fine", "damages", "liability", "dispute",
                "arbitration", "mediation", "settlement", "claim",
                "intellectual property", "copyright infringement", "trademark",
                "confidentiality breach", "data breach", "privacy violation",
                "employment law", "discrimination", "harassment",
            ],
            patterns: &[
                r"breach\s+of\s+\w+\s+agreement",
                r"failure\s+to\s+comply",
                r"legal\s+consequences",
                r"monetary\s+damages",
                r"regulatory\s+violation",
            ],
            weight: 0.8,
        },
        KeywordTable {
            severity: Severity::Medium,
            keywords: &[
                "contract amendment", "policy update", "compliance review",
                "audit", "inspection", "notification", "reminder",
                "renewal", "extension", "modification", "addendum",
                "terms and conditions", "service agreement", "license",
                "permit", "registration", "filing requirement",
            ],
            patterns: &[
                r"requires?\s+your\s+attention",
                r"please\s+review",
                r"action\s+required",
                r"compliance\s+update",
                r"policy\s+change",
            ],
            weight: 0.6,
        },
        KeywordTable {
            severity: Severity::Low,
            keywords: &[
                "information", "notice", "announcement", "update",
                "newsletter", "bulletin", "advisory", "guidance",
                "recommendation", "suggestion", "best practice",
                "educational", "informational", "reference",
            ],
            patterns: &[
                r"for\s+your\s+information",
                r"informational\s+purposes",
                r"no\s+action\s+required",
                r"reference\s+only",
                r"educational\s+material",
            ],
            weight: 0.4,
        },
    ]
}

/// Classify `document_text` using the keyword/pattern tables, entirely offline and
/// deterministic. Returns LOW with confidence ≈0.3 if nothing matches (§4.5).
pub fn classify(document_text: &str, document_id: &str, tables: &[KeywordTable]) -> FallbackResult {
    let lower = document_text.to_lowercase();

    let mut best: Option<(&KeywordTable, f64, Vec<String>, usize)> = None;

    for table in tables {
        let mut score = 0.0;
        let mut matched_keywords = Vec::new();
        for keyword in table.keywords {
            if lower.contains(&keyword.to_lowercase()) {
                score += table.weight;
                matched_keywords.push((*keyword).to_string());
            }
        }
        let mut matched_pattern_count = 0;
        for pattern in table.patterns {
            if let Ok(re) = Regex::new(&format!("(?i){pattern}")) {
                let count = re.find_iter(document_text).count();
                if count > 0 {
                    score += table.weight * count as f64;
                    matched_pattern_count += count;
                }
            }
        }
        if score > 0.0 {
            let replace = match &best {
                None => true,
                Some((_, best_score, _, _)) => score > *best_score,
            };
            if replace {
                best = Some((table, score, matched_keywords, matched_pattern_count));
            }
        }
    }

    match best {
        None => FallbackResult {
            label: Severity::Low,
            confidence: 0.3,
            rationale: "FALLBACK: no specific legal keywords detected, defaulting to LOW severity".to_string(),
            evidence: Vec::new(),
        },
        Some((table, score, keywords, pattern_count)) => {
            let confidence = (score / 5.0 + keywords.len() as f64 * 0.1).min(0.8);
            let mut rationale = "FALLBACK: keyword-based classification. ".to_string();
            if !keywords.is_empty() {
                let sample: Vec<&str> = keywords.iter().take(3).map(|s| s.as_str()).collect();
                rationale.push_str(&format!("Keywords detected: {}. ", sample.join(", ")));
            }
            if pattern_count > 0 {
                rationale.push_str(&format!("Patterns matched: {pattern_count}."));
            }
            let evidence = vec![ClassificationEvidence {
                source_document_id: format!("fallback_keywords_{document_id}"),
                chunk_text: format!("Keywords: {}", keywords.join(", ")),
                similarity: confidence as f32,
                bucket_id: "keyword_classifier".to_string(),
            }];
            FallbackResult {
                label: table.severity,
                confidence,
                rationale,
                evidence,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_keyword_match_defaults_to_low() {
        let result = classify("A pleasant afternoon in the park.", "doc-1", &default_tables());
        assert_eq!(result.label, Severity::Low);
        assert!((result.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn critical_keywords_win_over_lower_severity_matches() {
        let text = "This cease and desist notice accompanies an informational update.";
        let result = classify(text, "doc-2", &default_tables());
        assert_eq!(result.label, Severity::Critical);
        assert!(result.confidence <= 0.8);
    }

    #[test]
    fn confidence_is_capped_at_point_eight() {
        let text = "lawsuit litigation criminal charges felony fraud embezzlement bankruptcy \
cease and desist injunction restraining order emergency urgent legal action court order \
subpoena warrant class action punitive damages criminal liability immediate termination \
breach of contract";
        let result = classify(text, "doc-3", &default_tables());
        assert!(result.confidence <= 0.8);
    }

    #[test]
    fn pattern_matches_contribute_to_score() {
        let text = "You must respond within 10 days or face further action.";
        let result = classify(text, "doc-4", &default_tables());
        assert_eq!(result.label, Severity::Critical);
    }
}
