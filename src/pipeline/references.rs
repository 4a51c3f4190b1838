//! Reference formatting: bibliography text to a rendered citation list.
//!
//! Any failure here, including a transport error or an answer that stayed
//! invalid through every repair, becomes an error block in place of the
//! list. The rest of the document is unaffected.

use crate::error::SectionError;
use crate::pipeline::llm::ModelCaller;
use crate::pipeline::task::{ConvertReferences, Task};
use crate::pipeline::Rendered;
use crate::prompts;
use crate::reference::{render_references, Reference};
use tracing::{info, warn};

pub struct ReferenceFormatter<'a> {
    caller: &'a ModelCaller,
}

impl<'a> ReferenceFormatter<'a> {
    pub fn new(caller: &'a ModelCaller) -> Self {
        Self { caller }
    }

    /// Convert `text` and render it, under `## {heading}` when a heading is
    /// given.
    ///
    /// `section` names the unit in the recorded [`SectionError`].
    pub async fn format(&self, section: &str, text: &str, heading: Option<&str>) -> Rendered {
        let prefix = heading.map(|h| format!("## {h}\n\n")).unwrap_or_default();
        match self.convert(text).await {
            Ok(references) => {
                info!("'{}': {} references", section, references.len());
                Rendered::ok(format!("{prefix}{}", render_references(&references)))
            }
            Err(detail) => {
                warn!("'{}': reference formatting failed: {}", section, detail);
                Rendered::failed(
                    format!("{prefix}```\n{detail}\n```"),
                    SectionError::ReferenceFormatting {
                        section: section.to_string(),
                        detail,
                    },
                )
            }
        }
    }

    async fn convert(&self, text: &str) -> Result<Vec<Reference>, String> {
        let inputs = prompts::inputs([("full_text", text)]);
        self.caller
            .invoke::<ConvertReferences>(&inputs)
            .await
            .and_then(|outcome| outcome.into_result(ConvertReferences::NAME))
            .map(|list| list.references)
            .map_err(|e| e.to_string())
    }
}
