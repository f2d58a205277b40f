//! LLM classifier (C5, §4.5): prompt construction, remote call, response parsing, fallback.

pub mod classifier;
pub mod fallback;
pub mod prompt;
pub mod provider;

pub use classifier::{InitialRouting, LlmClassifier, RawClassification};
pub use fallback::{classify as classify_with_fallback, default_tables, FallbackResult, KeywordTable};
pub use provider::{HttpLlmProvider, LlmProvider};
