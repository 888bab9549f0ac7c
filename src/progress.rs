//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an `Arc<dyn RunProgress>` via
//! [`crate::config::PipelineConfigBuilder::progress`] to receive events
//! as the batch orchestrator works through the address list. Callbacks
//! are the least-invasive integration point: the CLI forwards them to a
//! terminal progress bar, a host application can forward them anywhere
//! else, and the library knows nothing about either.

/// Called by the pipeline as pages are processed.
///
/// Pages within a batch run concurrently, so `on_page_*` methods may be
/// called from different tasks at once; implementations must synchronise
/// shared state themselves. All methods default to no-ops.
pub trait RunProgress: Send + Sync {
    /// Called once before any page is fetched.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page's retrieval begins.
    fn on_page_start(&self, index: usize, total_pages: usize, url: &str) {
        let _ = (index, total_pages, url);
    }

    /// Called when a page settles. `ok` is false for error chapters.
    fn on_page_complete(&self, index: usize, total_pages: usize, ok: bool) {
        let _ = (index, total_pages, ok);
    }

    /// Called once after the last batch settles.
    fn on_run_complete(&self, total_pages: usize, succeeded: usize) {
        let _ = (total_pages, succeeded);
    }
}
