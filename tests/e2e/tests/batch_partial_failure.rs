//! An unexpected failure classifying one document in a batch does not abort the batch; it is
//! recorded as a degraded, human-triage result alongside the other documents' real outcomes.

use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::RoutingDecision;
use verdict_e2e_harness::harness::TestDatabaseManager;
use verdict_e2e_harness::mocks::providers::{ScriptedEmbeddingProvider, ScriptedLlmProvider, ScriptedResponse};

#[tokio::test]
async fn batch_continues_past_a_single_document_failure() {
    let embedding_provider =
        ScriptedEmbeddingProvider::new(vec![1.0, 0.0, 0.0, 0.0]).failing_on("TRIGGER_EMBED_FAILURE");
    let llm_provider = ScriptedLlmProvider::new(vec![
        ScriptedResponse::Ok(
            r#"{"label": "MEDIUM", "confidence": 0.9, "rationale": "Routine policy update notice, no escalation needed."}"#
                .to_string(),
        ),
        ScriptedResponse::Ok(
            r#"{"label": "LOW", "confidence": 0.9, "rationale": "Informational bulletin with no actionable risk."}"#
                .to_string(),
        ),
    ]);

    let db = TestDatabaseManager::new(Box::new(embedding_provider), Box::new(llm_provider));

    let documents = vec![
        Document::new_classification("Policy update notice regarding the annual compliance review.", DocumentMetadata::default()),
        Document::new_classification("TRIGGER_EMBED_FAILURE this document cannot be embedded.", DocumentMetadata::default()),
        Document::new_classification("Informational bulletin for your records, no action required.", DocumentMetadata::default()),
    ];
    let document_ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();

    let results = db.orchestrator.classify_batch(documents).await.expect("batch completes despite the failure");

    assert_eq!(results.len(), 3);

    assert_eq!(results[0].document_id, document_ids[0]);
    assert_ne!(results[0].confidence, 0.0);

    assert_eq!(results[1].document_id, document_ids[1]);
    assert_eq!(results[1].confidence, 0.0);
    assert_eq!(results[1].routing, RoutingDecision::HumanTriage);
    assert!(!results[1].rationale.is_empty());

    assert_eq!(results[2].document_id, document_ids[2]);
    assert_ne!(results[2].confidence, 0.0);
}
