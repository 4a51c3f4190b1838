//! Section translation: translate one span, then normalise its formulas.
//!
//! The span handed in already starts with its heading line prefixed by the
//! markdown marker for its depth, so the model keeps the heading level.
//! Citation rewriting is applied afterwards by the orchestrator.

use crate::error::{SectionError, TranslateError};
use crate::pipeline::llm::ModelCaller;
use crate::pipeline::task::{NormalizeEquations, Task, TranslateSection};
use crate::pipeline::{halted_marker, Rendered};
use crate::prompts;
use tracing::{debug, warn};

pub struct SectionTranslator<'a> {
    caller: &'a ModelCaller,
    target_language: &'a str,
}

impl<'a> SectionTranslator<'a> {
    pub fn new(caller: &'a ModelCaller, target_language: &'a str) -> Self {
        Self { caller, target_language }
    }

    /// Translate exactly one section.
    ///
    /// A halted generation in either pass yields an error block instead of
    /// an `Err`; transport errors and exhausted repairs are returned.
    pub async fn translate(&self, title: &str, source: &str) -> Result<Rendered, TranslateError> {
        let inputs = prompts::inputs([
            ("full_text", source),
            ("target_language", self.target_language),
        ]);
        let translated = match self
            .caller
            .invoke::<TranslateSection>(&inputs)
            .await?
            .into_halt_aware(TranslateSection::NAME)?
        {
            Ok(text) => text,
            Err(detail) => return Ok(self.halted(title, source, detail)),
        };
        debug!("Section '{}': {} chars translated", title, translated.len());

        let inputs = prompts::inputs([
            ("full_text", translated.as_str()),
            ("target_language", self.target_language),
        ]);
        match self
            .caller
            .invoke::<NormalizeEquations>(&inputs)
            .await?
            .into_halt_aware(NormalizeEquations::NAME)?
        {
            Ok(normalized) => Ok(Rendered::ok(normalized)),
            Err(detail) => Ok(self.halted(title, source, detail)),
        }
    }

    fn halted(&self, title: &str, source: &str, detail: String) -> Rendered {
        warn!("Section '{}' replaced by an error block: {}", title, detail);
        Rendered::failed(
            halted_marker(title, source, &detail),
            SectionError::GenerationHalted {
                section: title.to_string(),
                detail,
            },
        )
    }
}
