//! Context retriever (C4, §4.4): chunking, selection, and assembly.

pub mod chunking;
pub mod context;

pub use chunking::{chunk_text, Chunk};
pub use context::{
    BucketSummary, ClassificationEvidence, ContextBlock, ContextError, ContextRetriever,
    RankedChunk, NO_CONTEXT_BUCKET,
};
