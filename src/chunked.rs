//! Chunked translator: fixed-size page chunks with rolling context.
//!
//! Used when no exploitable outline exists. Pages are grouped into chunks
//! of `pages_per_chunk`; each chunk is classified (body prose, reference
//! list, or both), translated and/or converted, and a [`RollingContext`]
//! carries the outline so far plus the boundary lines into the next chunk
//! so headings and sentences continue across the cut.
//!
//! Every model call goes through the cache, and the prompt of chunk *i+1*
//! contains the context produced by chunk *i*, so a rerun over the same
//! pages replays from disk up to the first chunk that never completed.

use crate::config::TranslationConfig;
use crate::error::{SectionError, TranslateError};
use crate::output::{FragmentKind, FragmentResult};
use crate::pipeline::llm::ModelCaller;
use crate::pipeline::postprocess::{extract_tag, last_non_blank_lines};
use crate::pipeline::references::ReferenceFormatter;
use crate::pipeline::task::{ChunkKinds, ClassifyChunk, Task, TranslateChunk};
use crate::pipeline::{halted_marker, Rendered};
use crate::prompts;
use crate::source::join_pages;
use crate::translate::UnitDriver;
use tracing::{debug, warn};

/// Non-blank lines carried across a chunk boundary, per side.
pub const CONTEXT_LINES: usize = 3;

/// A contiguous group of source pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageChunk {
    /// Zero-based position in the chunk sequence.
    pub index: usize,
    /// Zero-based, inclusive.
    pub first_page: usize,
    pub last_page: usize,
    pub text: String,
}

impl PageChunk {
    /// Human-readable unit title, 1-based pages.
    pub fn label(&self) -> String {
        if self.first_page == self.last_page {
            format!("page {}", self.first_page + 1)
        } else {
            format!("pages {}-{}", self.first_page + 1, self.last_page + 1)
        }
    }
}

/// Group pages into chunks of `pages_per_chunk` (the last may be shorter).
pub fn page_chunks<S: AsRef<str>>(pages: &[S], pages_per_chunk: usize) -> Vec<PageChunk> {
    pages
        .chunks(pages_per_chunk.max(1))
        .enumerate()
        .map(|(index, group)| {
            let first_page = index * pages_per_chunk.max(1);
            PageChunk {
                index,
                first_page,
                last_page: first_page + group.len() - 1,
                text: join_pages(group),
            }
        })
        .collect()
}

/// State threaded from one chunk to the next within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollingContext {
    pub outline_summary: Option<String>,
    pub last_input_lines: String,
    pub last_output_lines: String,
}

impl RollingContext {
    /// The `<previous>` block prepended to the next chunk's message.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<previous>");
        if let Some(outline) = &self.outline_summary {
            xml.push_str(&format!("<outline>{outline}</outline>"));
        }
        xml.push_str(&format!(
            "<last_input>{}</last_input><last_output>{}</last_output></previous>\n\n",
            self.last_input_lines, self.last_output_lines
        ));
        xml
    }
}

pub struct ChunkedTranslator<'a> {
    caller: &'a ModelCaller,
    config: &'a TranslationConfig,
}

impl<'a> ChunkedTranslator<'a> {
    pub fn new(caller: &'a ModelCaller, config: &'a TranslationConfig) -> Self {
        Self { caller, config }
    }

    /// Translate every chunk in order; one fragment per chunk.
    pub async fn run<S: AsRef<str>>(
        &self,
        pages: &[S],
    ) -> Result<Vec<FragmentResult>, TranslateError> {
        let chunks = page_chunks(pages, self.config.pages_per_chunk);
        let mut driver = UnitDriver::start(self.config, self.caller, chunks.len());
        let mut fragments = Vec::with_capacity(chunks.len());
        let mut context: Option<RollingContext> = None;

        for chunk in &chunks {
            let label = chunk.label();
            driver.begin(chunk.index + 1, &label).await;
            let (rendered, next) = self.translate_chunk(chunk, context.as_ref()).await?;
            driver.finish(chunk.index + 1, &rendered);

            fragments.push(FragmentResult {
                index: chunk.index + 1,
                title: label,
                kind: FragmentKind::Chunk,
                markdown: rendered.markdown,
                error: rendered.error,
            });
            context = Some(next);
        }

        driver.complete(fragments.iter().filter(|f| f.is_ok()).count());
        Ok(fragments)
    }

    /// Process one chunk given the context left by its predecessor.
    pub async fn translate_chunk(
        &self,
        chunk: &PageChunk,
        previous: Option<&RollingContext>,
    ) -> Result<(Rendered, RollingContext), TranslateError> {
        let label = chunk.label();
        let kinds = self.classify(chunk).await?;
        debug!("{}: body={} references={}", label, kinds.contains_body, kinds.contains_references);
        if !kinds.contains_body && !kinds.contains_references {
            warn!("{}: classified as neither body nor references, skipped", label);
        }

        let mut parts: Vec<String> = Vec::new();
        let mut translated: Vec<String> = Vec::new();
        let mut error: Option<SectionError> = None;
        let mut outline = previous.and_then(|p| p.outline_summary.clone());

        if kinds.contains_body {
            let previous_xml = previous.map(RollingContext::to_xml).unwrap_or_default();
            let inputs = prompts::inputs([
                ("full_text", chunk.text.as_str()),
                ("target_language", self.config.target_language.as_str()),
                ("previous", previous_xml.as_str()),
            ]);
            match self
                .caller
                .invoke::<TranslateChunk>(&inputs)
                .await?
                .into_halt_aware(TranslateChunk::NAME)?
            {
                Ok(answer) => {
                    let (body, chunk_outline) = split_answer(&label, &answer);
                    if chunk_outline.is_some() {
                        outline = chunk_outline;
                    }
                    translated.push(body.clone());
                    parts.push(body);
                }
                Err(detail) => {
                    warn!("{} replaced by an error block: {}", label, detail);
                    parts.push(halted_marker(&label, &chunk.text, &detail));
                    error = Some(SectionError::GenerationHalted {
                        section: label.clone(),
                        detail,
                    });
                }
            }
        }

        if kinds.contains_references {
            let references = ReferenceFormatter::new(self.caller)
                .format(&label, &chunk.text, None)
                .await;
            if references.is_ok() {
                translated.push(references.markdown.clone());
            }
            parts.push(references.markdown);
            error = error.or(references.error);
        }

        let markdown = join_parts(&parts);
        let next = RollingContext {
            outline_summary: outline,
            last_input_lines: last_non_blank_lines(&chunk.text, CONTEXT_LINES),
            last_output_lines: last_non_blank_lines(&join_parts(&translated), CONTEXT_LINES),
        };
        Ok((Rendered { markdown, error }, next))
    }

    /// A halted classification falls back to "body only".
    async fn classify(&self, chunk: &PageChunk) -> Result<ChunkKinds, TranslateError> {
        let inputs = prompts::inputs([("full_text", chunk.text.as_str())]);
        match self
            .caller
            .invoke::<ClassifyChunk>(&inputs)
            .await?
            .into_halt_aware(ClassifyChunk::NAME)?
        {
            Ok(kinds) => Ok(kinds),
            Err(detail) => {
                warn!("{}: classification halted ({}), treating as body", chunk.label(), detail);
                Ok(ChunkKinds {
                    contains_body: true,
                    contains_references: false,
                })
            }
        }
    }
}

/// Translation body and outline of a chunk answer.
fn split_answer(label: &str, answer: &str) -> (String, Option<String>) {
    let body = extract_tag(answer, "translate");
    let outline = extract_tag(answer, "outline").concat();
    let outline = Some(outline.trim().to_string()).filter(|o| !o.is_empty());
    if body.is_empty() {
        warn!("{}: answer has no <translate> tag, using it whole", label);
        return (answer.trim().to_string(), outline);
    }
    (body.concat().trim().to_string(), outline)
}

fn join_parts(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
