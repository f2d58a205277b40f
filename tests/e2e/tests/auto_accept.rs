//! A classification target closely matching a HIGH-severity reference corpus, with a
//! correspondingly confident LLM response, should clear the auto-accept bar with no warning.

use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::{RoutingDecision, Severity};
use verdict_e2e_harness::harness::TestDatabaseManager;
use verdict_e2e_harness::mocks::fixtures;
use verdict_e2e_harness::mocks::providers::{ScriptedEmbeddingProvider, ScriptedLlmProvider, ScriptedResponse};

#[tokio::test]
async fn breach_of_contract_auto_accepts_at_high_confidence() {
    let embedding_provider = ScriptedEmbeddingProvider::new(vec![1.0, 0.0, 0.0, 0.0]);
    let llm_provider = ScriptedLlmProvider::new(vec![ScriptedResponse::Ok(
        r#"{"label": "HIGH", "confidence": 0.92, "rationale": "Matches the breach of contract reference corpus with strong textual alignment."}"#
            .to_string(),
    )]);

    let db = TestDatabaseManager::new(Box::new(embedding_provider), Box::new(llm_provider));
    db.seed_reference_corpus(fixtures::breach_of_contract_corpus(3)).await;

    let document = Document::new_classification(
        "Notice of breach: the counterparty failed to perform material obligations under the Services Agreement.",
        DocumentMetadata::default(),
    );

    let result = db.orchestrator.classify(document).await.expect("classification succeeds");

    assert_eq!(result.severity, Severity::High);
    assert!(result.confidence >= 0.85, "confidence {} should clear the auto-accept bar", result.confidence);
    assert_eq!(result.routing, RoutingDecision::AutoAccept);
    assert!(result.warning_level.is_none());
}
