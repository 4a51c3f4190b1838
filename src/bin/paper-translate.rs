//! CLI binary for paper-translate.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `TranslationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper_translate::{
    suggested_filename, translate_file, FragmentSink, MarkdownFileSink, ProgressCallback, Strategy,
    TranslationConfig, TranslationOutput, TranslationProgressCallback,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per section or
/// chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_translation_start` reports the unit count; the
    /// outline call runs before that and can take a while.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} units  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Translating");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut times| times.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl TranslationProgressCallback for CliProgressCallback {
    fn on_translation_start(&self, total_units: usize) {
        self.activate_bar(total_units);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Translating {total_units} units…"))
        ));
    }

    fn on_unit_start(&self, index: usize, _total: usize, title: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(title.to_string());
    }

    fn on_unit_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let elapsed = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, index: usize, total: usize, error: &str) {
        let elapsed = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Unit {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_translation_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} units translated successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} units translated  ({} replaced by error blocks)",
                if failed == total_units { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_units,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text first (pages separated by form feeds)
  pdftotext -layout paper.pdf paper.txt

  # Translate into Japanese (stdout)
  paper-translate paper.txt

  # Translate into German, resumable, written to a file
  paper-translate paper.txt -l German --cache-dir tmp/cache -o paper.de.md

  # Name the file after the paper title, with note front matter
  paper-translate paper.txt --output-dir notes/ --front-matter --url https://arxiv.org/abs/1706.03762

  # Skip outline extraction, 3 pages per chunk, first 10 pages only
  paper-translate paper.txt --strategy chunked --pages-per-chunk 3 --page-limit 10

  # Stronger model for the outline only
  paper-translate paper.txt --model gpt-4.1-mini --outline-model gpt-4.1

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID

RESUMING:
  Every model call is cached under --cache-dir. Rerunning the same command
  after a crash or quota error replays completed calls from disk and only
  sends the missing ones. Delete the directory to start over.
"#;

/// Translate scientific papers into Markdown using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "paper-translate",
    version,
    about = "Translate scientific papers into structurally faithful Markdown using LLMs",
    long_about = "Translate the extracted text of a scientific paper section by section, \
with formulas in TeX, a linked reference list and citation backlinks. Supports OpenAI, \
Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page-text file (pages separated by form feeds, as written by pdftotext).
    input: PathBuf,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PAPER_TRANSLATE_OUTPUT", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Write Markdown into this directory, named after the paper title.
    #[arg(long, env = "PAPER_TRANSLATE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Target language.
    #[arg(short, long, env = "PAPER_TRANSLATE_LANGUAGE", default_value = "Japanese")]
    language: String,

    /// LLM model ID for translation tasks.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM model ID for outline extraction (defaults to --model).
    #[arg(long, env = "PAPER_TRANSLATE_OUTLINE_MODEL")]
    outline_model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Translation strategy.
    #[arg(long, env = "PAPER_TRANSLATE_STRATEGY", value_enum, default_value = "auto")]
    strategy: StrategyArg,

    /// Pages per chunk in the chunked strategy.
    #[arg(long, env = "PAPER_TRANSLATE_PAGES_PER_CHUNK", default_value_t = 2)]
    pages_per_chunk: usize,

    /// Translate only the first N pages.
    #[arg(long, env = "PAPER_TRANSLATE_PAGE_LIMIT")]
    page_limit: Option<usize>,

    /// Directory of the call cache; enables resuming.
    #[arg(long, env = "PAPER_TRANSLATE_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Delay between sections in milliseconds.
    #[arg(long, env = "PAPER_TRANSLATE_INTERVAL_MS", default_value_t = 3000)]
    interval_ms: u64,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PAPER_TRANSLATE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PAPER_TRANSLATE_TEMPERATURE", default_value_t = 0.5)]
    temperature: f32,

    /// Repair attempts for an invalid structured answer.
    #[arg(long, env = "PAPER_TRANSLATE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Heading of the rendered reference list.
    #[arg(long, env = "PAPER_TRANSLATE_REFERENCES_HEADING", default_value = "References")]
    references_heading: String,

    /// Prepend YAML front matter (tags, title, url).
    #[arg(long, env = "PAPER_TRANSLATE_FRONT_MATTER")]
    front_matter: bool,

    /// Source URL recorded in the front matter.
    #[arg(long, env = "PAPER_TRANSLATE_URL")]
    url: Option<String>,

    /// Output structured JSON (TranslationOutput) instead of Markdown.
    #[arg(long, env = "PAPER_TRANSLATE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER_TRANSLATE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER_TRANSLATE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER_TRANSLATE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum StrategyArg {
    Auto,
    Outline,
    Chunked,
}

impl From<StrategyArg> for Strategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Auto => Strategy::Auto,
            StrategyArg::Outline => Strategy::Outline,
            StrategyArg::Chunked => Strategy::Chunked,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn TranslationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run translation ──────────────────────────────────────────────────
    let output = translate_file(&cli.input, &config)
        .await
        .with_context(|| format!("Translation of {} failed", cli.input.display()))?;

    let target = cli
        .output
        .clone()
        .or_else(|| cli.output_dir.as_ref().map(|d| d.join(suggested_filename(&output.title))));

    match target {
        Some(path) => {
            MarkdownFileSink::new(&path)
                .accept(&output)
                .await
                .context("Failed to write output")?;
            if !cli.quiet {
                print_summary(&output, Some(&path));
            }
        }
        None => {
            if cli.json {
                let json =
                    serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(output.markdown.as_bytes())
                    .context("Failed to write to stdout")?;
                if !output.markdown.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
            if !cli.quiet && !cli.json {
                print_summary(&output, None);
            }
        }
    }

    Ok(())
}

fn print_summary(output: &TranslationOutput, path: Option<&PathBuf>) {
    let stats = &output.stats;
    let failed = stats.halted_units + stats.reference_failures;
    let target = path
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "{}  {}/{} units  {}ms{}",
        if failed == 0 { green("✔") } else { cyan("⚠") },
        stats.translated_units,
        stats.total_units,
        stats.duration_ms,
        target,
    );
    eprintln!(
        "   {} requests  /  {} cache hits  /  {} repairs  /  {} tokens in  /  {} tokens out",
        dim(&stats.model_requests.to_string()),
        dim(&stats.cache_hits.to_string()),
        dim(&stats.repair_attempts.to_string()),
        dim(&stats.prompt_tokens.to_string()),
        dim(&stats.completion_tokens.to_string()),
    );
}

/// Map CLI args to `TranslationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TranslationConfig> {
    let mut builder = TranslationConfig::builder()
        .target_language(cli.language.clone())
        .strategy(cli.strategy.clone().into())
        .pages_per_chunk(cli.pages_per_chunk)
        .section_interval_ms(cli.interval_ms)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .references_heading(cli.references_heading.clone())
        .include_front_matter(cli.front_matter);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref model) = cli.outline_model {
        builder = builder.outline_model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(limit) = cli.page_limit {
        builder = builder.page_limit(limit);
    }
    if let Some(ref dir) = cli.cache_dir {
        builder = builder.cache_dir(dir.clone());
    }
    if let Some(ref url) = cli.url {
        builder = builder.source_url(url.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
