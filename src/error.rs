//! Error types for the paper-translate library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TranslateError`] — **Fatal**: the run cannot produce a document
//!   (provider not configured, transport failure, a structured answer that
//!   stayed invalid after every repair attempt). Returned as
//!   `Err(TranslateError)` from the top-level `translate*` functions.
//!
//! * [`SectionError`] — **Non-fatal**: one section or chunk could not be
//!   translated (generation halted, reference list unparseable) but the rest
//!   of the document is fine. Stored inside [`crate::output::FragmentResult`]
//!   next to the visible error block that replaced the section.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper-translate library.
#[derive(Debug, Error)]
pub enum TranslateError {
    // ── Model errors ──────────────────────────────────────────────────────
    /// A structured model answer failed validation after every repair retry.
    #[error("Task '{task}' returned invalid structured output after {attempts} repair attempts: {detail}")]
    SchemaValidation {
        task: String,
        attempts: u32,
        detail: String,
    },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider stopped a call whose answer the run cannot do without
    /// (output limit or safety filter).
    #[error("Task '{task}' was halted by the provider: {detail}")]
    GenerationHalted { task: String, detail: String },

    /// The LLM API returned an error. Never retried by the core.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The extracted document has no text at all.
    #[error("Document is empty: nothing to translate")]
    EmptyDocument,

    /// The page-text file does not exist.
    #[error("Source text not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// The page-text file exists but could not be read as UTF-8 text.
    #[error("Failed to read source text '{path}': {source}")]
    SourceReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache key arguments could not be serialised.
    #[error("Cannot derive cache key: {0}")]
    CacheKey(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single section or chunk.
///
/// The document still contains a fragment for the unit: an error block
/// carrying the original text (halted generation) or the failure text
/// (reference formatting).
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// The model stopped before completing (safety filter or length limit).
    #[error("Section '{section}': generation halted: {detail}")]
    GenerationHalted { section: String, detail: String },

    /// The references block could not be converted to citation records.
    #[error("Section '{section}': reference formatting failed: {detail}")]
    ReferenceFormatting { section: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_validation_display() {
        let e = TranslateError::SchemaValidation {
            task: "extract_outline".into(),
            attempts: 3,
            detail: "missing field `title`".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("extract_outline"), "got: {msg}");
        assert!(msg.contains("3 repair attempts"), "got: {msg}");
    }

    #[test]
    fn provider_not_configured_display() {
        let e = TranslateError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn section_error_display() {
        let e = SectionError::GenerationHalted {
            section: "Method".into(),
            detail: "finish_reason=SAFETY".into(),
        };
        assert!(e.to_string().contains("Method"));
        assert!(e.to_string().contains("SAFETY"));
    }

    #[test]
    fn section_error_serialises() {
        let e = SectionError::ReferenceFormatting {
            section: "References".into(),
            detail: "bad json".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: SectionError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
