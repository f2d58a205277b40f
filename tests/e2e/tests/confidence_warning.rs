//! A borderline-confidence CRITICAL prediction backed by a single, weakly-similar reference
//! chunk should carry a `high` warning and route to human review rather than auto-accepting.

use verdict_core::config::{PipelineConfig, RetrievalConfig};
use verdict_core::confidence::{RoutingDecision, WarningLevel};
use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::Severity;
use verdict_e2e_harness::harness::TestDatabaseManager;
use verdict_e2e_harness::mocks::providers::{ScriptedEmbeddingProvider, ScriptedLlmProvider, ScriptedResponse};

const REFERENCE_TEXT: &str =
    "Reference advisory: a prior compliance review noted minor administrative filing delays in the quarterly report.";

#[tokio::test]
async fn weak_evidence_and_extreme_severity_routes_to_human_review() {
    let embedding_provider = ScriptedEmbeddingProvider::new(vec![1.0, 0.0, 0.0, 0.0])
        .with_vector(REFERENCE_TEXT, vec![0.3, 0.953939, 0.0, 0.0]);
    let llm_provider = ScriptedLlmProvider::new(vec![ScriptedResponse::Ok(
        r#"{"label": "CRITICAL", "confidence": 0.45, "rationale": "Possible critical exposure, but the supporting evidence is thin."}"#
            .to_string(),
    )]);

    // Lower the bucket-selection bar so the single, weakly-similar reference chunk is still
    // retrieved as context instead of falling back to an empty block.
    let config = PipelineConfig {
        retrieval: RetrievalConfig { min_bucket_similarity: 0.1, ..RetrievalConfig::default() },
        ..PipelineConfig::default()
    };
    let db = TestDatabaseManager::with_config(Box::new(embedding_provider), Box::new(llm_provider), config);

    let reference = Document::new_reference(REFERENCE_TEXT, Severity::High, DocumentMetadata::default());
    db.seed_reference_corpus(vec![reference]).await;

    let document = Document::new_classification(
        "Urgent escalation requested: possible exposure under the master agreement is under review.",
        DocumentMetadata::default(),
    );

    let result = db.orchestrator.classify(document).await.expect("classification succeeds");

    assert_eq!(result.severity, Severity::Critical);
    assert_eq!(result.warning_level, Some(WarningLevel::High));
    assert_eq!(result.routing, RoutingDecision::HumanReview);
}
