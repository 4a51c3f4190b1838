//! Outline extraction: one structured call over line-numbered text.

use crate::document::{number_lines, StructuredDocument};
use crate::error::TranslateError;
use crate::pipeline::llm::ModelCaller;
use crate::pipeline::task::{ExtractOutline, Task};
use crate::prompts;
use tracing::info;

/// Ask the outline model for the paper's title, keywords and section tree.
///
/// Offsets are taken as given; [`crate::document::Outline::top_level_spans`]
/// is where out-of-order offsets are absorbed. A still-invalid answer is
/// [`TranslateError::SchemaValidation`]; a halted one is
/// [`TranslateError::GenerationHalted`], which `Strategy::Auto` recovers from.
pub async fn extract_outline(
    caller: &ModelCaller,
    text: &str,
) -> Result<StructuredDocument, TranslateError> {
    let numbered = number_lines(text);
    let inputs = prompts::inputs([("full_text", numbered.as_str())]);

    let response = caller
        .invoke::<ExtractOutline>(&inputs)
        .await?
        .into_result(ExtractOutline::NAME)?;

    let paper = response.paper;
    let document = StructuredDocument::new(paper.title, &paper.keywords, &paper.sections);
    info!(
        "Outline: '{}', {} top-level sections ({} total)",
        document.title,
        document.outline.root_count(),
        document.outline.len()
    );
    Ok(document)
}
