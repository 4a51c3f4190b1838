//! Translation entry points and the outline-driven orchestrator.
//!
//! ## Flow
//!
//! ```text
//! pages ─▶ join ─▶ outline ─┬─▶ per top-level section:
//!                           │     references? ─▶ ReferenceFormatter
//!                           │     otherwise    ─▶ SectionTranslator ─▶ citations
//!                           └─▶ unusable outline (Auto) ─▶ ChunkedTranslator
//! ```
//!
//! Sections are processed strictly in document order with a pacing delay
//! between them. A run is not resumable in-process; rerunning with the same
//! `cache_dir` replays completed calls from disk instead.

use crate::cache::CacheStore;
use crate::chunked::ChunkedTranslator;
use crate::config::{ModelTier, Strategy, TranslationConfig};
use crate::document::{heading_marker, StructuredDocument};
use crate::error::TranslateError;
use crate::output::{
    assemble, front_matter, FragmentKind, FragmentResult, TranslationOutput, TranslationStats,
};
use crate::pipeline::citations::rewrite_citations;
use crate::pipeline::llm::{ChatClient, Clients, ModelCaller, ProviderClient};
use crate::pipeline::outline::extract_outline;
use crate::pipeline::references::ReferenceFormatter;
use crate::pipeline::section::SectionTranslator;
use crate::pipeline::Rendered;
use crate::sink::write_atomic;
use crate::source;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Translate an already-extracted paper, one string per page.
///
/// # Returns
/// `Ok(TranslationOutput)` on success, even if some sections were replaced
/// by error blocks (check `output.stats.halted_units` and
/// `output.stats.reference_failures`).
///
/// # Errors
/// Returns `Err(TranslateError)` only for fatal errors:
/// - no provider configured, or a transport/API error
/// - a structured answer (outline, classification) still invalid after
///   every repair attempt
/// - a halted outline call under `Strategy::Outline` (`Strategy::Auto`
///   falls back to chunks instead)
/// - an empty document
pub async fn translate_pages<S: AsRef<str>>(
    pages: &[S],
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    let total_start = Instant::now();
    let pages = source::limit_pages(pages, config.page_limit);
    let text = source::join_pages(pages);
    if text.trim().is_empty() {
        return Err(TranslateError::EmptyDocument);
    }
    info!(
        "Translating {} pages ({} chars) into {}",
        pages.len(),
        text.len(),
        config.target_language
    );

    // ── Step 1: Client handles + cache ───────────────────────────────────
    let clients = resolve_clients(config)?;
    let cache = CacheStore::from_option(config.cache_dir.as_deref());
    if let Some(dir) = &config.cache_dir {
        debug!("Cache directory: {}", dir.display());
    }
    let caller = ModelCaller::new(clients, cache, config.call_settings());

    // ── Step 2: Strategy ─────────────────────────────────────────────────
    let (strategy, document) = match config.strategy {
        Strategy::Chunked => (Strategy::Chunked, None),
        Strategy::Outline => (Strategy::Outline, Some(extract_outline(&caller, &text).await?)),
        Strategy::Auto => match extract_outline(&caller, &text).await {
            Ok(document) if document.outline.is_usable(text.split('\n').count()) => {
                (Strategy::Outline, Some(document))
            }
            Ok(document) => {
                warn!(
                    "Outline has no section inside the document ({} top-level), \
                     falling back to chunks",
                    document.outline.root_count()
                );
                (Strategy::Chunked, None)
            }
            Err(TranslateError::GenerationHalted { detail, .. }) => {
                warn!("Outline generation halted ({}), falling back to chunks", detail);
                (Strategy::Chunked, None)
            }
            Err(e) => return Err(e),
        },
    };

    // ── Step 3: Units ────────────────────────────────────────────────────
    let (title, keywords, fragments) = match document {
        Some(document) => {
            let fragments = OutlineTranslator::new(&caller, config).run(&document, &text).await?;
            (document.title, document.keywords.into_iter().collect(), fragments)
        }
        None => {
            let fragments = ChunkedTranslator::new(&caller, config).run(pages).await?;
            (first_line_title(&text), Vec::new(), fragments)
        }
    };

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let mut markdown = assemble(&fragments);
    if config.include_front_matter {
        markdown = front_matter(&title, config.source_url.as_deref()) + &markdown;
    }

    let usage = caller.usage();
    let mut stats = TranslationStats {
        strategy: Some(strategy),
        model_requests: usage.requests,
        repair_attempts: usage.repair_attempts,
        cache_hits: caller.cache().hits(),
        cache_misses: caller.cache().misses(),
        prompt_tokens: usage.prompt_tokens as u64,
        completion_tokens: usage.completion_tokens as u64,
        duration_ms: total_start.elapsed().as_millis() as u64,
        ..TranslationStats::default()
    };
    stats.count_fragments(&fragments);

    info!(
        "Translation complete: {}/{} units, {} requests, {} cache hits, {}ms",
        stats.translated_units,
        stats.total_units,
        stats.model_requests,
        stats.cache_hits,
        stats.duration_ms
    );

    Ok(TranslationOutput {
        title,
        keywords,
        fragments,
        markdown,
        stats,
    })
}

/// Translate a single text, treated as one page.
pub async fn translate_text(
    text: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    translate_pages(&[text.as_ref()], config).await
}

/// Translate a page-text file (pages separated by form feeds).
pub async fn translate_file(
    path: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    let pages = source::load_pages(path).await?;
    translate_pages(&pages, config).await
}

/// Translate a page-text file and write the document to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn translate_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationStats, TranslateError> {
    let output = translate_file(path, config).await?;
    write_atomic(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`translate_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_sync(
    path: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, TranslateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TranslateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(translate_file(path, config))
}

// ── Outline orchestrator ─────────────────────────────────────────────────

/// Sequences section translation over the top-level sections of an outline.
pub struct OutlineTranslator<'a> {
    caller: &'a ModelCaller,
    config: &'a TranslationConfig,
}

impl<'a> OutlineTranslator<'a> {
    pub fn new(caller: &'a ModelCaller, config: &'a TranslationConfig) -> Self {
        Self { caller, config }
    }

    /// Title fragment, then one fragment per non-empty top-level section.
    pub async fn run(
        &self,
        document: &StructuredDocument,
        text: &str,
    ) -> Result<Vec<FragmentResult>, TranslateError> {
        let lines: Vec<&str> = text.split('\n').collect();
        let spans: Vec<_> = document
            .outline
            .top_level_spans(lines.len())
            .into_iter()
            .filter(|span| {
                if span.is_empty() {
                    warn!("Skipping section {} with an empty line range", span.id);
                }
                !span.is_empty()
            })
            .collect();

        let mut fragments = Vec::with_capacity(spans.len() + 1);
        fragments.push(FragmentResult {
            index: 0,
            title: document.title.clone(),
            kind: FragmentKind::Title,
            markdown: format!("# {}", document.title),
            error: None,
        });

        let sections = SectionTranslator::new(self.caller, &self.config.target_language);
        let references = ReferenceFormatter::new(self.caller);
        let mut driver = UnitDriver::start(self.config, self.caller, spans.len());

        for (i, span) in spans.iter().enumerate() {
            let Some(section) = document.outline.get(span.id) else {
                return Err(TranslateError::Internal(format!("no section with id {}", span.id)));
            };
            let index = i + 1;
            driver.begin(index, &section.title).await;

            let source = format!("{} {}", heading_marker(section.depth), span.text(&lines));
            debug!(
                "Section '{}': lines {}..{}",
                section.title, span.start_line, span.end_line
            );
            let (kind, rendered) = if section.is_references {
                let rendered = references
                    .format(&section.title, &source, Some(&self.config.references_heading))
                    .await;
                (FragmentKind::References, rendered)
            } else {
                let mut rendered = sections.translate(&section.title, &source).await?;
                if rendered.is_ok() {
                    rendered.markdown = rewrite_citations(&rendered.markdown);
                }
                (FragmentKind::Section, rendered)
            };

            driver.finish(index, &rendered);
            fragments.push(FragmentResult {
                index,
                title: section.title.clone(),
                kind,
                markdown: rendered.markdown,
                error: rendered.error,
            });
        }

        driver.complete(fragments.iter().skip(1).filter(|f| f.is_ok()).count());
        Ok(fragments)
    }
}

// ── Unit bookkeeping ─────────────────────────────────────────────────────

/// Progress events and pacing shared by both orchestrators.
///
/// The pacing delay is skipped after a unit that was served entirely from
/// the cache: it made no provider request to throttle. Calls made before the
/// first unit (the outline) count as a previous unit.
pub(crate) struct UnitDriver<'a> {
    config: &'a TranslationConfig,
    caller: &'a ModelCaller,
    total: usize,
    requests_at_begin: usize,
    last_unit_requests: usize,
}

impl<'a> UnitDriver<'a> {
    pub(crate) fn start(
        config: &'a TranslationConfig,
        caller: &'a ModelCaller,
        total: usize,
    ) -> Self {
        if let Some(ref cb) = config.progress_callback {
            cb.on_translation_start(total);
        }
        Self {
            config,
            caller,
            total,
            requests_at_begin: 0,
            last_unit_requests: caller.usage().requests,
        }
    }

    pub(crate) async fn begin(&mut self, index: usize, title: &str) {
        if self.last_unit_requests > 0 && self.config.section_interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.section_interval_ms)).await;
        }
        info!("Unit {}/{}: {}", index, self.total, title);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_unit_start(index, self.total, title);
        }
        self.requests_at_begin = self.caller.usage().requests;
    }

    pub(crate) fn finish(&mut self, index: usize, rendered: &Rendered) {
        self.last_unit_requests = self.caller.usage().requests - self.requests_at_begin;
        if let Some(ref cb) = self.config.progress_callback {
            match &rendered.error {
                None => cb.on_unit_complete(index, self.total, rendered.markdown.len()),
                Some(e) => cb.on_unit_error(index, self.total, &e.to_string()),
            }
        }
    }

    pub(crate) fn complete(&self, success_count: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_translation_complete(self.total, success_count);
        }
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// First non-blank line of the source; the title when no outline exists.
fn first_line_title(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TranslateError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        TranslateError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider for one model tier, most specific first:
///
/// 1. **Named provider** (`config.provider_name`) with the tier's model.
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    unless the config names a model for this tier.
/// 3. **OpenAI** when `OPENAI_API_KEY` is set.
/// 4. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider and the model name recorded in cache keys.
fn resolve_provider(
    config: &TranslationConfig,
    tier: ModelTier,
) -> Result<(Arc<dyn LLMProvider>, String), TranslateError> {
    let configured = config.model_for(tier);

    if let Some(ref name) = config.provider_name {
        let model = configured.unwrap_or(DEFAULT_MODEL);
        return Ok((create_provider(name, model)?, model.to_string()));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let model = configured.map(str::to_string).unwrap_or(env_model);
            return Ok((create_provider(&prov, &model)?, model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = configured.unwrap_or(DEFAULT_MODEL);
            return Ok((create_provider("openai", model)?, model.to_string()));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TranslateError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok((llm_provider, configured.unwrap_or("auto").to_string()))
}

/// Build the client handle for each tier.
///
/// A pre-built `config.client` serves every tier. Otherwise the outline
/// tier gets its own provider only when it names a different model.
pub fn resolve_clients(config: &TranslationConfig) -> Result<Clients, TranslateError> {
    if let Some(ref client) = config.client {
        return Ok(Clients::single(Arc::clone(client)));
    }

    let (provider, model) = resolve_provider(config, ModelTier::Standard)?;
    let standard: Arc<dyn ChatClient> = Arc::new(ProviderClient::new(provider, model));

    if config.model_for(ModelTier::Outline) == config.model_for(ModelTier::Standard) {
        return Ok(Clients::single(standard));
    }
    let (provider, model) = resolve_provider(config, ModelTier::Outline)?;
    info!("Outline model: {}", model);
    Ok(Clients::new(standard, Arc::new(ProviderClient::new(provider, model))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_falls_back_to_first_line() {
        assert_eq!(
            first_line_title("\n\n  Attention Is All You Need \nabc"),
            "Attention Is All You Need"
        );
        assert_eq!(first_line_title(""), "");
    }

    #[tokio::test]
    async fn empty_document_is_rejected() {
        let config = TranslationConfig::default();
        let err = translate_pages(&["  \n", ""], &config).await.unwrap_err();
        assert!(matches!(err, TranslateError::EmptyDocument));
    }

    #[tokio::test]
    async fn missing_source_is_reported() {
        let config = TranslationConfig::default();
        let err = translate_file("/no/such/paper.txt", &config).await.unwrap_err();
        assert!(matches!(err, TranslateError::SourceNotFound { .. }));
    }
}
