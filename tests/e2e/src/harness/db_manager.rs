//! Wires an in-memory SQLite-backed [`Orchestrator`] for one test, with scripted embedding and
//! LLM providers standing in for the remote services (§5, §6: "Persistence layout").

use std::sync::Arc;

use async_trait::async_trait;
use verdict_core::config::{BreakerConfig, EmbeddingConfig, PipelineConfig, RetryConfig};
use verdict_core::document::Document;
use verdict_core::embeddings::{EmbeddingCache, EmbeddingClient, EmbeddingProvider, TaskHint};
use verdict_core::embeddings::cache::InMemoryCacheStore;
use verdict_core::error::EmbeddingError;
use verdict_core::llm::{LlmClassifier, LlmProvider};
use verdict_core::store::sqlite::{
    SqliteAuditLog, SqliteBucketStore, SqliteClassificationStore, SqlitePool, SqliteReferenceStore,
    SqliteRuleStore,
};
use verdict_core::store::{AuditLogStore, BucketStore, ClassificationStore, ReferenceStore, RuleStore};
use verdict_core::{Bucket, BucketEngine, CircuitBreaker, Orchestrator, Rule};

/// Lets the harness and the orchestrator each own a distinct [`EmbeddingClient`] (cache, rate
/// limiter, breaker) backed by the same scripted provider instance.
struct SharedEmbeddingProvider(Arc<dyn EmbeddingProvider>);

#[async_trait]
impl EmbeddingProvider for SharedEmbeddingProvider {
    async fn embed_content(&self, content: &str, task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError> {
        self.0.embed_content(content, task_hint).await
    }
}

/// Fast retry tuning so scripted failures don't stall the test suite on real backoff delays.
pub fn test_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(5),
        jitter: 0.0,
    }
}

/// Embedding config matching the scripted providers' fixed 4-dimension vectors.
pub fn test_embedding_config() -> EmbeddingConfig {
    EmbeddingConfig {
        dimensions: 4,
        model_id: "test-embedding-model".to_string(),
        rate_per_minute: 1_000_000,
        ..EmbeddingConfig::default()
    }
}

/// An in-memory database plus a fully wired [`Orchestrator`], isolated per test.
pub struct TestDatabaseManager {
    pub orchestrator: Orchestrator,
    pub embeddings: EmbeddingClient,
    pub reference_store: Arc<dyn ReferenceStore>,
    pub bucket_store: Arc<dyn BucketStore>,
    pub rule_store: Arc<dyn RuleStore>,
    pub classification_store: Arc<dyn ClassificationStore>,
    bucket_engine: BucketEngine,
}

impl TestDatabaseManager {
    pub fn new(embedding_provider: Box<dyn EmbeddingProvider>, llm_provider: Box<dyn LlmProvider>) -> Self {
        Self::with_config(embedding_provider, llm_provider, PipelineConfig::default())
    }

    /// Like [`Self::new`], but lets a scenario override retrieval/confidence/clustering
    /// thresholds instead of living with the production defaults.
    pub fn with_config(embedding_provider: Box<dyn EmbeddingProvider>, llm_provider: Box<dyn LlmProvider>, base_config: PipelineConfig) -> Self {
        let pool = Arc::new(SqlitePool::open_in_memory().expect("open in-memory sqlite pool"));

        let reference_store: Arc<dyn ReferenceStore> = Arc::new(SqliteReferenceStore::new(pool.clone()));
        let bucket_store: Arc<dyn BucketStore> = Arc::new(SqliteBucketStore::new(pool.clone()));
        let rule_store: Arc<dyn RuleStore> = Arc::new(SqliteRuleStore::new(pool.clone()));
        let classification_store: Arc<dyn ClassificationStore> = Arc::new(SqliteClassificationStore::new(pool.clone()));
        let audit_store: Arc<dyn AuditLogStore> = Arc::new(SqliteAuditLog::new(pool));

        let provider: Arc<dyn EmbeddingProvider> = Arc::from(embedding_provider);
        let embedding_config = test_embedding_config();
        let embeddings = EmbeddingClient::new(
            Box::new(SharedEmbeddingProvider(provider.clone())),
            EmbeddingCache::new(Box::new(InMemoryCacheStore::default()), 30, 256),
            &embedding_config,
            test_retry(),
            CircuitBreaker::new("test-embedding", BreakerConfig::embedding_default()),
        );
        let orchestrator_embeddings = EmbeddingClient::new(
            Box::new(SharedEmbeddingProvider(provider)),
            EmbeddingCache::new(Box::new(InMemoryCacheStore::default()), 30, 256),
            &embedding_config,
            test_retry(),
            CircuitBreaker::new("test-embedding", BreakerConfig::embedding_default()),
        );

        let llm = LlmClassifier::new(
            llm_provider,
            CircuitBreaker::new("test-llm", BreakerConfig::llm_default()),
            test_retry(),
            verdict_core::config::LlmConfig::default(),
        );

        let config = PipelineConfig { embedding: embedding_config, retry: test_retry(), ..base_config };

        let orchestrator = Orchestrator::new(
            config.clone(),
            orchestrator_embeddings,
            llm,
            reference_store.clone(),
            bucket_store.clone(),
            rule_store.clone(),
            classification_store.clone(),
            audit_store,
        );

        Self {
            orchestrator,
            embeddings,
            reference_store,
            bucket_store,
            rule_store,
            classification_store,
            bucket_engine: BucketEngine::new(config.clustering),
        }
    }

    /// Embed and store every reference document, cluster them into a single bucket (the
    /// fixtures are small enough to stay below `min_k`), and persist that bucket.
    pub async fn seed_reference_corpus(&self, mut documents: Vec<Document>) -> Bucket {
        for document in documents.iter_mut() {
            document.embedding = self.embeddings.embed(&document.text, TaskHint::Document).await.expect("embed reference document");
        }
        for document in &documents {
            self.reference_store.put(document.clone()).await.expect("store reference document");
        }
        // Force a single bucket: the scenario fixtures are deliberately small and scripted, so
        // letting k-means choose k would make bucket membership nondeterministic noise.
        let buckets = self.bucket_engine.build_from(&documents, Some(1), 7);
        let bucket = buckets.into_iter().next().expect("corpus produced at least one bucket");
        self.bucket_store.put(bucket.clone()).await.expect("store bucket")
    }

    pub async fn add_rule(&self, rule: Rule) -> Rule {
        self.rule_store.put(rule, "seeded for test", None).await.expect("store rule")
    }
}
