//! Deterministic stand-ins for the remote embedding and LLM providers (§4.1, §4.5), grounded on
//! `verdict_core::llm::classifier`'s own `ScriptedProvider` test double.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use verdict_core::embeddings::{EmbeddingProvider, TaskHint};
use verdict_core::error::{EmbeddingError, LlmError};
use verdict_core::llm::LlmProvider;

/// Maps exact document text to a fixed vector. Texts not in the table fall back to
/// `default_vector`; texts containing any `fail_on` substring return `Unavailable`.
pub struct ScriptedEmbeddingProvider {
    table: HashMap<String, Vec<f32>>,
    fail_on: Vec<String>,
    default_vector: Vec<f32>,
}

impl ScriptedEmbeddingProvider {
    pub fn new(default_vector: Vec<f32>) -> Self {
        Self { table: HashMap::new(), fail_on: Vec::new(), default_vector }
    }

    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.table.insert(text.into(), vector);
        self
    }

    pub fn failing_on(mut self, substring: impl Into<String>) -> Self {
        self.fail_on.push(substring.into());
        self
    }
}

#[async_trait]
impl EmbeddingProvider for ScriptedEmbeddingProvider {
    async fn embed_content(&self, content: &str, _task_hint: TaskHint) -> Result<Vec<f32>, EmbeddingError> {
        if content.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("empty content".to_string()));
        }
        if self.fail_on.iter().any(|needle| content.contains(needle.as_str())) {
            return Err(EmbeddingError::Unavailable("scripted embedding failure".to_string()));
        }
        Ok(self.table.get(content).cloned().unwrap_or_else(|| self.default_vector.clone()))
    }
}

/// One scripted LLM response, constructed fresh on each `generate()` call since `LlmError` is
/// not `Clone` outside the crate's own test module.
pub enum ScriptedResponse {
    Ok(String),
    Unavailable,
    ParseFailure,
}

/// Replays a fixed sequence of responses in order, repeating the last one once exhausted.
pub struct ScriptedLlmProvider {
    state: Mutex<(Vec<ScriptedResponse>, usize)>,
}

impl ScriptedLlmProvider {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        assert!(!responses.is_empty(), "ScriptedLlmProvider needs at least one response");
        Self { state: Mutex::new((responses, 0)) }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn generate(&self, _prompt: &str, _temperature: f32, _max_output_tokens: u32) -> Result<String, LlmError> {
        let mut guard = self.state.lock().unwrap();
        let (responses, index) = &mut *guard;
        let i = (*index).min(responses.len() - 1);
        *index += 1;
        match &responses[i] {
            ScriptedResponse::Ok(body) => Ok(body.clone()),
            ScriptedResponse::Unavailable => Err(LlmError::Unavailable("scripted unavailable".to_string())),
            ScriptedResponse::ParseFailure => Ok("this is not a json object".to_string()),
        }
    }
}

/// Always fails, exhausting every retry attempt and forcing the keyword fallback (§4.5, §8
/// scenario 4).
pub struct AlwaysFailLlmProvider;

#[async_trait]
impl LlmProvider for AlwaysFailLlmProvider {
    async fn generate(&self, _prompt: &str, _temperature: f32, _max_output_tokens: u32) -> Result<String, LlmError> {
        Err(LlmError::Unavailable("llm service unreachable".to_string()))
    }
}
