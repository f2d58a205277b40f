//! Uploading two reference documents with identical (normalized) text is rejected on the second
//! call; the store's state is unaffected by the rejected write.

use verdict_core::document::{Document, DocumentMetadata};
use verdict_core::error::StoreError;
use verdict_core::Severity;
use verdict_e2e_harness::harness::TestDatabaseManager;
use verdict_e2e_harness::mocks::providers::{AlwaysFailLlmProvider, ScriptedEmbeddingProvider};

#[tokio::test]
async fn duplicate_content_hash_is_rejected_on_second_upload() {
    let embedding_provider = ScriptedEmbeddingProvider::new(vec![1.0, 0.0, 0.0, 0.0]);
    let db = TestDatabaseManager::new(Box::new(embedding_provider), Box::new(AlwaysFailLlmProvider));

    let text = "Reference notice: repeated breach of the confidentiality clause under the licensing agreement.";
    let metadata = DocumentMetadata::default();

    let first = Document::new_reference(text, Severity::High, metadata.clone());
    db.reference_store.put(first).await.expect("first upload succeeds");

    let second = Document::new_reference(text, Severity::High, metadata);
    let err = db.reference_store.put(second).await.expect_err("duplicate content hash must be rejected");
    assert!(matches!(err, StoreError::Duplicate(_)));

    let stored = db.reference_store.list_references().await.expect("list references");
    assert_eq!(stored.len(), 1);
}
