//! Result types of a translation run.
//!
//! The core hands back an ordered list of fragments; what happens to them
//! (file, note service, repository) is up to the caller. [`TranslationOutput::markdown`]
//! is the plain concatenation most callers want.

use crate::config::Strategy;
use crate::error::SectionError;
use serde::{Deserialize, Serialize};

/// What produced a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentKind {
    /// `# {title}`, always first.
    Title,
    /// A top-level section translated by the outline pipeline.
    Section,
    /// A references section rendered as a citation list.
    References,
    /// One page chunk of the chunked translator.
    Chunk,
}

/// One fragment of the translated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentResult {
    /// Position in the document, 0 for the title.
    pub index: usize,
    pub title: String,
    pub kind: FragmentKind,
    pub markdown: String,
    /// Set when `markdown` is an error block standing in for the unit.
    pub error: Option<SectionError>,
}

impl FragmentResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationStats {
    /// Orchestrator that actually ran (`Auto` resolves to one of the others).
    pub strategy: Option<Strategy>,
    /// Sections or chunks processed, excluding the title fragment.
    pub total_units: usize,
    pub translated_units: usize,
    pub halted_units: usize,
    pub reference_failures: usize,
    /// Requests that reached the provider (cache hits excluded).
    pub model_requests: usize,
    pub repair_attempts: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_ms: u64,
}

impl TranslationStats {
    /// Tally the per-unit outcome counters from the fragment list.
    pub fn count_fragments(&mut self, fragments: &[FragmentResult]) {
        let units = fragments.iter().filter(|f| f.kind != FragmentKind::Title);
        self.total_units = 0;
        self.translated_units = 0;
        self.halted_units = 0;
        self.reference_failures = 0;
        for fragment in units {
            self.total_units += 1;
            match &fragment.error {
                None => self.translated_units += 1,
                Some(SectionError::GenerationHalted { .. }) => self.halted_units += 1,
                Some(SectionError::ReferenceFormatting { .. }) => self.reference_failures += 1,
            }
        }
    }
}

/// The translated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub title: String,
    pub keywords: Vec<String>,
    /// Title fragment first, then one fragment per unit in document order.
    pub fragments: Vec<FragmentResult>,
    /// Assembled document, including front matter when configured.
    pub markdown: String,
    pub stats: TranslationStats,
}

impl TranslationOutput {
    /// Fragments that were replaced by error blocks.
    pub fn failed_fragments(&self) -> impl Iterator<Item = &FragmentResult> {
        self.fragments.iter().filter(|f| !f.is_ok())
    }
}

/// Join fragments with blank lines.
pub fn assemble(fragments: &[FragmentResult]) -> String {
    fragments
        .iter()
        .map(|f| f.markdown.trim())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// YAML front matter for note-taking tools.
pub fn front_matter(title: &str, url: Option<&str>) -> String {
    let mut yaml = String::from("---\ntags: [paper]\n");
    yaml.push_str(&format!("title: \"{}\"\n", title.replace('\\', "\\\\").replace('"', "\\\"")));
    if let Some(url) = url {
        yaml.push_str(&format!("url: {url}\n"));
    }
    yaml.push_str("---\n\n");
    yaml
}
