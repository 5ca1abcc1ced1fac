//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe a
//! run: when the document is loaded, which pages were flagged relevant, and
//! every page the scanner sends to the vision model.
//!
//! `target` is the object of interest being scanned for, one of the labels
//! in [`crate::prompts`]. Page numbers are 0-based, matching
//! [`crate::output::ExtractionResult::page`].
//!
//! # Example
//!
//! ```rust
//! use statement_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CallCounter {
//!     calls: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CallCounter {
//!     fn on_page_start(&self, target: &str, page: usize) {
//!         let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("model call #{n}: {target} on page {page}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CallCounter { calls: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it moves through a document.
///
/// All methods have no-op defaults so implementations override only what
/// they need. The pipeline is sequential, so events arrive in order.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Page text has been extracted.
    fn on_document_loaded(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Relevance filtering finished for both categories.
    fn on_relevance_computed(&self, person_pages: &[usize], money_pages: &[usize]) {
        let _ = (person_pages, money_pages);
    }

    /// A page scan for `target` is starting over `candidates` pages.
    fn on_scan_start(&self, target: &str, candidates: usize) {
        let _ = (target, candidates);
    }

    /// The vision model is about to be called for `page`.
    fn on_page_start(&self, target: &str, page: usize) {
        let _ = (target, page);
    }

    /// The model returned a non-empty answer of `answer_len` bytes.
    fn on_page_answer(&self, target: &str, page: usize, answer_len: usize) {
        let _ = (target, page, answer_len);
    }

    /// The model returned nothing usable for `page`.
    fn on_page_empty(&self, target: &str, page: usize) {
        let _ = (target, page);
    }

    /// The scan for `target` stopped with `results` recorded answers.
    fn on_scan_complete(&self, target: &str, results: usize) {
        let _ = (target, results);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        answers: AtomicUsize,
        empties: AtomicUsize,
        scans: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_document_loaded(&self, page_count: usize) {
            self.pages.store(page_count, Ordering::SeqCst);
        }

        fn on_page_answer(&self, _target: &str, _page: usize, _answer_len: usize) {
            self.answers.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_empty(&self, _target: &str, _page: usize) {
            self.empties.fetch_add(1, Ordering::SeqCst);
        }

        fn on_scan_complete(&self, _target: &str, _results: usize) {
            self.scans.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_loaded(5);
        cb.on_relevance_computed(&[1], &[0, 2]);
        cb.on_scan_start("Portfolio value", 2);
        cb.on_page_start("Portfolio value", 0);
        cb.on_page_empty("Portfolio value", 0);
        cb.on_page_answer("Portfolio value", 2, 10);
        cb.on_scan_complete("Portfolio value", 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb: Arc<TrackingCallback> = Arc::default();
        let dyn_cb: ProgressCallback = cb.clone();

        dyn_cb.on_document_loaded(4);
        dyn_cb.on_page_empty("Account owner name", 0);
        dyn_cb.on_page_answer("Account owner name", 1, 8);
        dyn_cb.on_scan_complete("Account owner name", 1);

        assert_eq!(cb.pages.load(Ordering::SeqCst), 4);
        assert_eq!(cb.empties.load(Ordering::SeqCst), 1);
        assert_eq!(cb.answers.load(Ordering::SeqCst), 1);
        assert_eq!(cb.scans.load(Ordering::SeqCst), 1);
    }
}
