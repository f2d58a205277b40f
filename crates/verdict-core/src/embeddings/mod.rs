//! Embedding client (C1, §4.1).

pub mod cache;
pub mod client;
pub mod provider;
pub mod types;

pub use cache::{CacheEntry, EmbeddingCache, EmbeddingCacheStore, InMemoryCacheStore};
pub use client::EmbeddingClient;
pub use provider::{EmbeddingProvider, HttpEmbeddingProvider};
pub use types::{clamp_similarity, cosine_similarity, dot_product, l2_normalize, Embedding, TaskHint};
