//! Page processing: fetch → transform → resolve images, for one address.
//!
//! The processor always returns a [`PageOutcome`] — it never panics or
//! propagates an error past this boundary, so the batch orchestrator
//! can treat every invocation as a tagged success/failure result and a
//! single bad page can't take down a run.

use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::output::Chapter;
use crate::pipeline::fetch::{fetch_with_strategies, Transport};
use crate::pipeline::images::{self, DownloadedImage, ImageCache};
use crate::pipeline::transform;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// The settled result of processing one address.
#[derive(Debug)]
pub struct PageOutcome {
    /// Position in the input address list.
    pub index: usize,
    pub url: String,
    /// `Some` on success; `None` when `error` is set.
    pub chapter: Option<Chapter>,
    pub error: Option<PageError>,
    /// Downloads that succeeded for this page (cached or fresh).
    pub images: Vec<Arc<DownloadedImage>>,
    pub duration_ms: u64,
}

/// Process one address into a chapter.
///
/// Stage failures the stage itself can absorb (a missing image, odd
/// markup) degrade in place; only total retrieval exhaustion produces a
/// failed outcome.
pub async fn process_page(
    transport: &dyn Transport,
    url: &str,
    index: usize,
    cache: &ImageCache,
    config: &PipelineConfig,
    scratch: &Path,
) -> PageOutcome {
    let start = Instant::now();
    info!("processing page {index}: {url}");

    let raw = match fetch_with_strategies(transport, url, &config.page_strategies, scratch).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("page {index} failed: {e}");
            return PageOutcome {
                index,
                url: url.to_string(),
                chapter: None,
                error: Some(PageError::FetchFailed {
                    index,
                    url: url.to_string(),
                    strategies: config.page_strategies.len(),
                    detail: e.to_string(),
                }),
                images: Vec::new(),
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }
    };

    let transformed = transform::transform(&raw, url, index);
    info!(
        "page {index}: '{}', {} image references",
        transformed.title,
        transformed.images.len()
    );

    let resolved = images::resolve_images(
        transport,
        transformed.markup,
        &transformed.images,
        cache,
        config,
        scratch,
    )
    .await;

    PageOutcome {
        index,
        url: url.to_string(),
        chapter: Some(Chapter {
            title: transformed.title,
            content: resolved.markup,
            source_url: url.to_string(),
        }),
        error: None,
        images: resolved.images,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}
