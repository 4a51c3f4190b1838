//! Configuration types for paper translation.
//!
//! All translation behaviour is controlled through [`TranslationConfig`],
//! built via its [`TranslationConfigBuilder`]. One struct for every knob
//! makes it easy to share a config between the outline pipeline and the
//! chunked fallback and to log exactly what a run used.

use crate::error::TranslateError;
use crate::pipeline::llm::{CallSettings, ChatClient};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a paper translation run.
///
/// # Example
/// ```rust
/// use paper_translate::{Strategy, TranslationConfig};
///
/// let config = TranslationConfig::builder()
///     .target_language("German")
///     .strategy(Strategy::Outline)
///     .cache_dir("tmp/cache")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 3);
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Language the paper is translated into. Default: "Japanese".
    pub target_language: String,

    /// Model for translation, equation and reference tasks.
    /// If None, uses `gpt-4.1-mini`.
    pub model: Option<String>,

    /// Model for outline extraction. If None, uses `model`.
    ///
    /// Outline extraction reads the whole paper in one call and has to emit
    /// exact line offsets; a stronger model here pays for itself.
    pub outline_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed client. Takes precedence over `provider_name` and
    /// serves every model tier.
    pub client: Option<Arc<dyn ChatClient>>,

    /// Sampling temperature for the first attempt of every call. Default: 0.5.
    pub temperature: f32,

    /// Temperature used for repair attempts after a schema failure. Default: 1.0.
    ///
    /// Re-sending at the same temperature tends to reproduce the same broken
    /// answer; a hotter sample gives the model a different completion.
    pub repair_temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// Repair attempts for a schema-typed call. Default: 3.
    pub max_retries: u32,

    /// Pause before each section's model calls, in milliseconds. Default: 3000.
    ///
    /// A throughput throttle for provider rate limits, not a correctness
    /// mechanism. Tests set it to 0.
    pub section_interval_ms: u64,

    /// Which orchestrator to run. Default: [`Strategy::Auto`].
    pub strategy: Strategy,

    /// Source pages per chunk in the chunked translator. Default: 2.
    pub pages_per_chunk: usize,

    /// Only translate the first N pages (chunked translator). Default: None.
    pub page_limit: Option<usize>,

    /// Directory of the content-addressed call cache. None disables caching.
    pub cache_dir: Option<PathBuf>,

    /// Heading placed above rendered reference lists. Default: "References".
    pub references_heading: String,

    /// Prepend YAML front matter to the assembled markdown. Default: false.
    pub include_front_matter: bool,

    /// Origin URL recorded in the front matter.
    pub source_url: Option<String>,

    /// Optional per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: "Japanese".to_string(),
            model: None,
            outline_model: None,
            provider_name: None,
            client: None,
            temperature: 0.5,
            repair_temperature: 1.0,
            max_tokens: 8192,
            max_retries: 3,
            section_interval_ms: 3000,
            strategy: Strategy::default(),
            pages_per_chunk: 2,
            page_limit: None,
            cache_dir: None,
            references_heading: "References".to_string(),
            include_front_matter: false,
            source_url: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("target_language", &self.target_language)
            .field("model", &self.model)
            .field("outline_model", &self.outline_model)
            .field("provider_name", &self.provider_name)
            .field("client", &self.client.as_ref().map(|_| "<dyn ChatClient>"))
            .field("temperature", &self.temperature)
            .field("repair_temperature", &self.repair_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("section_interval_ms", &self.section_interval_ms)
            .field("strategy", &self.strategy)
            .field("pages_per_chunk", &self.pages_per_chunk)
            .field("page_limit", &self.page_limit)
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model used for the given tier, before provider defaults apply.
    pub fn model_for(&self, tier: ModelTier) -> Option<&str> {
        match tier {
            ModelTier::Standard => self.model.as_deref(),
            ModelTier::Outline => self.outline_model.as_deref().or(self.model.as_deref()),
        }
    }

    /// Sampling and retry settings handed to the model caller.
    pub fn call_settings(&self) -> CallSettings {
        CallSettings {
            temperature: self.temperature,
            repair_temperature: self.repair_temperature,
            max_tokens: self.max_tokens,
            max_retries: self.max_retries,
        }
    }
}

/// Builder for [`TranslationConfig`].
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl fmt::Debug for TranslationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl TranslationConfigBuilder {
    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.config.target_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn outline_model(mut self, model: impl Into<String>) -> Self {
        self.config.outline_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn repair_temperature(mut self, t: f32) -> Self {
        self.config.repair_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn section_interval_ms(mut self, ms: u64) -> Self {
        self.config.section_interval_ms = ms;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn pages_per_chunk(mut self, n: usize) -> Self {
        self.config.pages_per_chunk = n;
        self
    }

    pub fn page_limit(mut self, n: usize) -> Self {
        self.config.page_limit = Some(n);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn references_heading(mut self, heading: impl Into<String>) -> Self {
        self.config.references_heading = heading.into();
        self
    }

    pub fn include_front_matter(mut self, v: bool) -> Self {
        self.config.include_front_matter = v;
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.config.source_url = Some(url.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslationConfig, TranslateError> {
        let c = &self.config;
        if c.target_language.trim().is_empty() {
            return Err(TranslateError::InvalidConfig(
                "target language must not be empty".into(),
            ));
        }
        if c.pages_per_chunk == 0 {
            return Err(TranslateError::InvalidConfig(
                "pages per chunk must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(TranslateError::InvalidConfig(
                "max tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which orchestrator turns page text into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Extract an outline; fall back to chunks when it is unusable. (default)
    #[default]
    Auto,
    /// Outline extraction followed by section-bounded translation.
    Outline,
    /// Fixed-size page chunks with rolling context.
    Chunked,
}

/// Which model a task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelTier {
    /// Translation, equation normalisation, references, chunk tasks.
    Standard,
    /// Whole-document outline extraction.
    Outline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let c = TranslationConfig::default();
        assert_eq!(c.target_language, "Japanese");
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.section_interval_ms, 3000);
        assert_eq!(c.pages_per_chunk, 2);
        assert_eq!(c.strategy, Strategy::Auto);
        assert!(c.cache_dir.is_none());
    }

    #[test]
    fn builder_rejects_zero_pages_per_chunk() {
        let err = TranslationConfig::builder()
            .pages_per_chunk(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("pages per chunk"));
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = TranslationConfig::builder()
            .temperature(9.0)
            .repair_temperature(-1.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.repair_temperature, 0.0);
    }

    #[test]
    fn outline_model_falls_back_to_model() {
        let c = TranslationConfig::builder().model("m-small").build().unwrap();
        assert_eq!(c.model_for(ModelTier::Outline), Some("m-small"));

        let c = TranslationConfig::builder()
            .model("m-small")
            .outline_model("m-large")
            .build()
            .unwrap();
        assert_eq!(c.model_for(ModelTier::Outline), Some("m-large"));
        assert_eq!(c.model_for(ModelTier::Standard), Some("m-small"));
    }
}
