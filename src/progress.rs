//! Progress-callback trait for per-unit translation events.
//!
//! A *unit* is one top-level section in the outline pipeline or one page
//! chunk in the chunked translator. Inject an
//! [`Arc<dyn TranslationProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the document.
//!
//! # Example
//!
//! ```rust
//! use paper_translate::{TranslationConfig, TranslationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TranslationProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, index: usize, total: usize, markdown_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Unit {}/{} done ({} bytes)", index, total, markdown_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = TranslationConfig::builder()
//!     .progress_callback(counter as Arc<dyn TranslationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the translation pipeline as it processes each unit.
///
/// Units are processed strictly in document order, one at a time. All
/// methods have default no-op implementations so callers only override
/// what they care about.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once the number of units is known (after outline extraction
    /// or chunking).
    fn on_translation_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called before the first model call of a unit.
    ///
    /// # Arguments
    /// * `index` — 1-indexed unit number
    /// * `total` — total units
    /// * `title` — section title, or `chunk N` in the chunked translator
    fn on_unit_start(&self, index: usize, total: usize, title: &str) {
        let _ = (index, total, title);
    }

    /// Called when a unit produced its fragment without error.
    fn on_unit_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let _ = (index, total, markdown_len);
    }

    /// Called when a unit was replaced by an error block.
    fn on_unit_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every unit has been attempted.
    fn on_translation_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;
