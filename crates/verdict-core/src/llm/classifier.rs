//! LLM classifier (C5, §4.5): orchestrates the provider, retry, breaker, parsing, and fallback.

use serde::Deserialize;

use crate::breaker::CircuitBreaker;
use crate::config::LlmConfig;
use crate::document::{Document, Severity};
use crate::error::LlmError;
use crate::retrieval::ClassificationEvidence;
use crate::retry::{retry_with_backoff, RetryConfig};

use super::fallback::{self, KeywordTable};
use super::prompt;
use super::provider::LlmProvider;

/// Draft routing decision derived purely from raw model confidence (§4.5: "Initial routing").
/// C7 may revise this before it reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialRouting {
    AutoAccept,
    HumanReview,
    HumanTriage,
}

fn initial_routing(confidence: f64) -> InitialRouting {
    if confidence >= 0.85 {
        InitialRouting::AutoAccept
    } else if confidence >= 0.60 {
        InitialRouting::HumanReview
    } else {
        InitialRouting::HumanTriage
    }
}

/// The raw classification produced by the LLM (or the fallback), before rule overrides.
#[derive(Debug, Clone)]
pub struct RawClassification {
    pub label: Severity,
    pub confidence: f64,
    pub rationale: String,
    pub was_fallback: bool,
    pub initial_routing: InitialRouting,
    /// Populated only when `was_fallback`: the keyword/pattern matches that produced this
    /// result, folded into the confidence calculator's evidence set alongside retrieved chunks.
    pub fallback_evidence: Vec<ClassificationEvidence>,
}

#[derive(Debug, Deserialize)]
struct ParsedResponse {
    label: String,
    confidence: f64,
    rationale: String,
}

/// Locate the first `{...}` JSON object in `text` and validate it against the response contract
/// (§4.5: "Response parsing").
fn parse_response(text: &str) -> Result<(Severity, f64, String), LlmError> {
    let start = text.find('{').ok_or_else(|| LlmError::ParseError("no JSON object found in response".to_string()))?;
    let end = text.rfind('}').ok_or_else(|| LlmError::ParseError("no JSON object found in response".to_string()))?;
    if end < start {
        return Err(LlmError::ParseError("malformed JSON object bounds".to_string()));
    }
    let candidate = &text[start..=end];

    let parsed: ParsedResponse = serde_json::from_str(candidate)
        .map_err(|e| LlmError::ParseError(format!("invalid JSON in response: {e}")))?;

    let label = Severity::parse(&parsed.label)
        .ok_or_else(|| LlmError::ParseError(format!("invalid severity label: {}", parsed.label)))?;

    if !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(LlmError::ParseError(format!("confidence out of range: {}", parsed.confidence)));
    }

    let rationale = parsed.rationale.trim().to_string();
    if rationale.len() < 10 {
        return Err(LlmError::ParseError("rationale must be at least 10 characters".to_string()));
    }

    Ok((label, parsed.confidence, rationale))
}

/// Orchestrates the LLM classification call: cache-free (unlike embeddings, prompts are
/// effectively unique per document), rate-limit-free (the LLM provider enforces its own), but
/// sharing the same retry/breaker shape as [`crate::embeddings::EmbeddingClient`].
pub struct LlmClassifier {
    provider: Box<dyn LlmProvider>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    config: LlmConfig,
    fallback_tables: Vec<KeywordTable>,
}

impl LlmClassifier {
    pub fn new(provider: Box<dyn LlmProvider>, breaker: CircuitBreaker, retry: RetryConfig, config: LlmConfig) -> Self {
        Self {
            provider,
            breaker,
            retry,
            config,
            fallback_tables: fallback::default_tables(),
        }
    }

    /// Classify `document` given already-rendered context text. Never returns an error: when the
    /// breaker is open or retries are exhausted, degrades to the keyword fallback (§4.5).
    #[tracing::instrument(skip(self, document, rendered_context), fields(document_id = %document.id))]
    pub async fn classify(&self, document: &Document, rendered_context: &str) -> RawClassification {
        match self.try_classify(document, rendered_context).await {
            Ok((label, confidence, rationale)) => RawClassification {
                label,
                confidence,
                initial_routing: initial_routing(confidence),
                rationale,
                was_fallback: false,
                fallback_evidence: Vec::new(),
            },
            Err(err) => {
                tracing::warn!(error = %err, "LLM classification failed; degrading to keyword fallback");
                let result = fallback::classify(&document.text, &document.id, &self.fallback_tables);
                RawClassification {
                    label: result.label,
                    confidence: result.confidence,
                    initial_routing: initial_routing(result.confidence),
                    rationale: result.rationale,
                    was_fallback: true,
                    fallback_evidence: result.evidence,
                }
            }
        }
    }

    async fn try_classify(&self, document: &Document, rendered_context: &str) -> Result<(Severity, f64, String), LlmError> {
        self.breaker.try_acquire().map_err(|_| LlmError::ServiceUnavailable)?;

        let prompt_text = prompt::render(document, rendered_context);

        let result = retry_with_backoff(&self.retry, |_attempt| async {
            let raw = self
                .provider
                .generate(&prompt_text, self.config.temperature, self.config.max_output_tokens)
                .await?;
            parse_response(&raw)
        })
        .await;

        match result {
            Ok(parsed) => {
                self.breaker.record_success();
                Ok(parsed)
            }
            Err(err) => {
                self.breaker.record_failure();
                Err(err)
            }
        }
    }
}
