//! Scripted embedding/LLM providers and reference-corpus fixtures.

pub mod fixtures;
pub mod providers;

pub use providers::{AlwaysFailLlmProvider, ScriptedEmbeddingProvider, ScriptedLlmProvider};
