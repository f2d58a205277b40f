//! Fixture builders for the reference corpus and rule set exercised by the scenario tests.

use chrono::Utc;
use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::rules::{Combinator, Condition, ConditionValue, Field, Operator, Rule};
use verdict_core::Severity;

/// A small corpus of HIGH-severity breach-of-contract reference documents, all mapped by the
/// test's embedding provider to the same vector so they cluster into a single bucket (§8
/// scenario 1).
pub fn breach_of_contract_corpus(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let text = format!(
                "Reference breach notice #{i}: the counterparty failed to perform material \
                 obligations under the Services Agreement, constituting a breach of contract \
                 subject to the remedies clause."
            );
            let metadata = DocumentMetadata {
                filename: format!("breach-{i}.txt"),
                upload_date: Utc::now(),
                document_type: "contract_dispute".to_string(),
                ..DocumentMetadata::default()
            };
            Document::new_reference(text, Severity::High, metadata)
        })
        .collect()
}

/// Rule used in §8 scenario 2: any document mentioning "immediate termination" is escalated to
/// CRITICAL regardless of the model's own label.
pub fn immediate_termination_rule() -> Rule {
    Rule::new(
        "Immediate termination escalation",
        90,
        vec![Condition {
            field: Field::Text,
            operator: Operator::Contains,
            value: ConditionValue::Str("immediate termination".to_string()),
            case_sensitive: false,
        }],
        Combinator::And,
        Severity::Critical,
    )
}
