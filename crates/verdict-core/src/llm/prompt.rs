//! Classification prompt template (§4.5: "Prompt contract").
//!
//! Grounded on `backend/gemini_classifier.py`'s `_create_classification_prompt`: a fixed
//! four-section template rather than a templating engine, since the shape never varies.

use crate::document::{Document, Severity};

const SEVERITY_DEFINITIONS: &str = "\
CRITICAL: Immediate legal action required, severe violations, regulatory breaches with significant penalties
HIGH: Important legal matters requiring prompt attention, compliance issues with moderate penalties
MEDIUM: Standard legal matters requiring review, minor compliance issues, routine legal processes
LOW: Administrative matters, informational documents, low-priority legal items";

/// Render the full classification prompt for one document (§4.5).
pub fn render(document: &Document, rendered_context: &str) -> String {
    format!(
        "You are an expert legal document classifier specializing in severity assessment. \
Your task is to classify the severity level of legal documents based on their content and \
similar reference examples.

CLASSIFICATION LEVELS:
{definitions}

DOCUMENT METADATA:
- Filename: {filename}
- Upload Date: {upload_date}
- File Size: {file_size} bytes

DOCUMENT TO CLASSIFY:
{text}

RELEVANT CONTEXT:
{context}

INSTRUCTIONS:
1. Analyze the document content carefully.
2. Compare it with the reference examples provided in the context.
3. Classify the document into one of the four severity levels.
4. Provide a confidence score between 0.0 and 1.0.
5. Explain your reasoning clearly.

RESPONSE FORMAT:
Respond with a single valid JSON object in exactly this format:
{{
    \"label\": \"CRITICAL|HIGH|MEDIUM|LOW\",
    \"confidence\": 0.XX,
    \"rationale\": \"Detailed explanation of your classification decision, at least 10 characters\"
}}",
        definitions = SEVERITY_DEFINITIONS,
        filename = if document.metadata.filename.is_empty() { "unknown" } else { &document.metadata.filename },
        upload_date = document.metadata.upload_date.to_rfc3339(),
        file_size = document.metadata.file_size,
        text = document.text,
        context = rendered_context,
    )
}

/// Enumerate the severities as they appear in the prompt, for tests and documentation.
pub fn severity_definitions() -> [(Severity, &'static str); 4] {
    [
        (Severity::Critical, "Immediate legal action required, severe violations, regulatory breaches with significant penalties"),
        (Severity::High, "Important legal matters requiring prompt attention, compliance issues with moderate penalties"),
        (Severity::Medium, "Standard legal matters requiring review, minor compliance issues, routine legal processes"),
        (Severity::Low, "Administrative matters, informational documents, low-priority legal items"),
    ]
}
