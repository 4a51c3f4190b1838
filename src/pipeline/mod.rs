//! Pipeline stages for structured paper translation.
//!
//! Each submodule implements exactly one step, so every step can be tested
//! against a scripted [`llm::ChatClient`] without a live model.
//!
//! ## Data Flow
//!
//! ```text
//! outline ──▶ section ──────────▶ citations ──▶ fragment
//!         └─▶ references ─────────────────────▶ fragment
//! ```
//!
//! 1. [`outline`]    — section tree with line offsets (one structured call)
//! 2. [`section`]    — translate a span, then normalise its formulas
//! 3. [`references`] — bibliography to [`crate::reference::Reference`] records
//! 4. [`citations`]  — `[n]` → `[[#^refn]]`, pure text transform
//! 5. [`llm`]        — the only stage with network I/O; owns the repair loop
//!    and the cache
//! 6. [`postprocess`] — deterministic cleanup of model text
//!
//! [`task`] declares the capability record of every model call.

pub mod citations;
pub mod llm;
pub mod outline;
pub mod postprocess;
pub mod references;
pub mod section;
pub mod task;

use crate::error::SectionError;

/// Markdown produced for one unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub markdown: String,
    /// Set when `markdown` is an error block standing in for the unit.
    pub error: Option<SectionError>,
}

impl Rendered {
    pub fn ok(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            error: None,
        }
    }

    pub fn failed(markdown: impl Into<String>, error: SectionError) -> Self {
        Self {
            markdown: markdown.into(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Error block replacing a unit whose generation halted: the title, the
/// untranslated text and the provider's reason.
pub fn halted_marker(title: &str, original: &str, detail: &str) -> String {
    format!("## {title}\n\n### body\n{original}\n\n### error\n```\n{detail}\n```")
}
