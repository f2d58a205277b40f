//! When the LLM provider is unavailable for every retry attempt, the classifier degrades to the
//! keyword fallback instead of failing the document.

use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::Severity;
use verdict_e2e_harness::harness::TestDatabaseManager;
use verdict_e2e_harness::mocks::providers::{AlwaysFailLlmProvider, ScriptedEmbeddingProvider};

#[tokio::test]
async fn llm_outage_degrades_to_keyword_fallback() {
    let embedding_provider = ScriptedEmbeddingProvider::new(vec![1.0, 0.0, 0.0, 0.0]);
    let db = TestDatabaseManager::new(Box::new(embedding_provider), Box::new(AlwaysFailLlmProvider));

    let document = Document::new_classification(
        "This notice references a pending class action and seeks punitive damages against the respondent.",
        DocumentMetadata::default(),
    );

    let result = db.orchestrator.classify(document).await.expect("classification succeeds via fallback");

    assert_eq!(result.severity, Severity::Critical);
    assert!(result.confidence <= 0.8);
    assert!(result.rationale.starts_with("FALLBACK: "), "rationale was: {}", result.rationale);
}
