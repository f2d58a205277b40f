//! A high-priority rule escalates the model's own label when its conditions match, and the
//! rationale records which rule applied.

use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::Severity;
use verdict_e2e_harness::harness::TestDatabaseManager;
use verdict_e2e_harness::mocks::fixtures;
use verdict_e2e_harness::mocks::providers::{ScriptedEmbeddingProvider, ScriptedLlmProvider, ScriptedResponse};

#[tokio::test]
async fn immediate_termination_rule_overrides_model_label() {
    let embedding_provider = ScriptedEmbeddingProvider::new(vec![1.0, 0.0, 0.0, 0.0]);
    let llm_provider = ScriptedLlmProvider::new(vec![ScriptedResponse::Ok(
        r#"{"label": "HIGH", "confidence": 0.78, "rationale": "Termination language present but not clearly critical on its own."}"#
            .to_string(),
    )]);

    let db = TestDatabaseManager::new(Box::new(embedding_provider), Box::new(llm_provider));
    let rule = db.add_rule(fixtures::immediate_termination_rule()).await;

    let document = Document::new_classification(
        "This letter gives notice of immediate termination of the Master Services Agreement effective today.",
        DocumentMetadata::default(),
    );

    let result = db.orchestrator.classify(document).await.expect("classification succeeds");

    assert_eq!(result.severity, Severity::Critical);
    assert_eq!(result.matched_rule_ids, vec![rule.id.clone()]);
    assert!(
        result.rationale.ends_with(&format!("Rule Overrides Applied: {}", rule.id)),
        "rationale did not record the override: {}",
        result.rationale
    );
}
