//! Output records produced by a pipeline run.
//!
//! A run yields one [`Chapter`] per input address — in input order,
//! regardless of which pages failed — plus [`RunStats`] describing what
//! happened along the way. Chapters are immutable once produced; nothing
//! downstream of the batch orchestrator mutates them.

use serde::{Deserialize, Serialize};

/// One processed page's contribution to the final document.
///
/// Produced by the page processor on success, or synthesised as an
/// error chapter by the batch orchestrator on failure. `content` is a
/// full HTML document with all images inlined as data URIs — the
/// document builder is never expected to resolve further references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Page title, or an error marker for failed pages.
    pub title: String,
    /// Cleaned markup with images embedded.
    pub content: String,
    /// The address this chapter was built from.
    pub source_url: String,
}

/// Document-level metadata handed to the document builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub language: String,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: "Web Articles Collection".to_string(),
            author: "webbook".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Statistics for a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Number of addresses requested.
    pub requested_pages: usize,
    /// Pages that produced a normal chapter.
    pub succeeded_pages: usize,
    /// Pages rendered as error chapters.
    pub failed_pages: usize,
    /// Distinct images downloaded across the whole run.
    pub images_downloaded: usize,
    /// References served from the run-scoped image cache.
    pub image_cache_hits: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
}

/// The result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// One chapter per input address, in input order.
    pub chapters: Vec<Chapter>,
    pub metadata: BookMetadata,
    pub stats: RunStats,
}
