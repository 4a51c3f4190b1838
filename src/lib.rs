//! # paper-translate
//!
//! Translate scientific papers into structurally faithful Markdown with
//! large language models.
//!
//! ## Why this crate?
//!
//! Pasting a whole paper into a chat model loses structure: headings drift,
//! formulas come back as prose, the bibliography gets "translated" and long
//! papers hit the output limit halfway through. This crate first asks the
//! model for the paper's outline, then translates one top-level section at a
//! time, renders the bibliography as linkable citation records and rewrites
//! `[n]` citations into backlinks. Every call is cached on disk, so an
//! interrupted multi-hour run resumes where it stopped.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page text
//!  │
//!  ├─ 1. Source     join pages, number lines
//!  ├─ 2. Outline    section tree with line offsets (schema-validated)
//!  ├─ 3. Sections   translate + normalise formulas, per top-level section
//!  ├─ 4. References bibliography → `1. [title](link) (year) ^refN`
//!  ├─ 5. Citations  `[1, 2]` → `[[#^ref1]] [[#^ref2]]`
//!  └─ 6. Output     ordered fragments + stats
//! ```
//!
//! When the outline is unusable, [`chunked`] translates fixed-size page
//! chunks with rolling context instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper_translate::{translate_file, TranslationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = TranslationConfig::builder()
//!         .target_language("Japanese")
//!         .cache_dir("tmp/cache")
//!         .build()?;
//!     let output = translate_file("paper.txt", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} sections, {} halted",
//!         output.stats.total_units,
//!         output.stats.halted_units);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-translate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paper-translate = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod chunked;
pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reference;
pub mod sink;
pub mod source;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::CacheStore;
pub use config::{ModelTier, Strategy, TranslationConfig, TranslationConfigBuilder};
pub use document::{Outline, Section, StructuredDocument};
pub use error::{SectionError, TranslateError};
pub use output::{FragmentKind, FragmentResult, TranslationOutput, TranslationStats};
pub use pipeline::llm::{CallOutcome, ChatClient, ChatReply, ChatRequest, FinishReason};
pub use progress::{NoopProgressCallback, ProgressCallback, TranslationProgressCallback};
pub use reference::Reference;
pub use sink::{suggested_filename, FragmentSink, MarkdownFileSink};
pub use translate::{
    translate_file, translate_pages, translate_sync, translate_text, translate_to_file,
};
