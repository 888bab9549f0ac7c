//! Pipeline driver: the end-to-end entry points.
//!
//! [`build`] runs the whole pipeline in memory and returns the ordered
//! chapters plus run statistics; [`build_to_file`] additionally hands
//! the result to a [`DocumentBuilder`] and writes the bundled document.
//! [`build_sync`] wraps `build_to_file` in its own runtime for callers
//! without one.

use crate::batch;
use crate::book::{DocumentBuilder, HtmlBundleBuilder};
use crate::config::PipelineConfig;
use crate::error::WebbookError;
use crate::output::{RunOutput, RunStats};
use crate::pipeline::fetch::{HttpTransport, Transport};
use crate::pipeline::images::ImageCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

/// Run the full pipeline for `urls` and return chapters in input order.
///
/// The chapter list is always exactly as long as `urls`; pages that
/// could not be retrieved appear as error chapters at their original
/// position. Only run-level problems (an empty address list, scratch
/// directory setup) surface as `Err`.
pub async fn build(urls: &[String], config: &PipelineConfig) -> Result<RunOutput, WebbookError> {
    if urls.is_empty() {
        return Err(WebbookError::NoAddresses);
    }

    let start = Instant::now();
    info!("starting run: {} addresses", urls.len());

    // Scratch space for transports that spool through the filesystem
    // (the curl fallback). Dropped, and so removed, when the run ends.
    let scratch = tempfile::tempdir()
        .map_err(|e| WebbookError::Internal(format!("scratch directory: {e}")))?;

    let transport: Arc<dyn Transport> = match &config.transport {
        Some(t) => Arc::clone(t),
        None => Arc::new(HttpTransport),
    };

    let cache = ImageCache::new();
    let report = batch::run_batches(transport.as_ref(), urls, &cache, config, scratch.path()).await;

    let stats = RunStats {
        requested_pages: urls.len(),
        succeeded_pages: report.succeeded_pages,
        failed_pages: report.failed_pages,
        images_downloaded: cache.len(),
        image_cache_hits: cache.hit_count(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "run complete: {}/{} pages, {} unique images ({} cache hits), {} ms",
        stats.succeeded_pages,
        stats.requested_pages,
        stats.images_downloaded,
        stats.image_cache_hits,
        stats.total_duration_ms
    );

    Ok(RunOutput {
        chapters: report.chapters,
        metadata: config.metadata.clone(),
        stats,
    })
}

/// Run the pipeline and write the bundled document with the default
/// [`HtmlBundleBuilder`].
pub async fn build_to_file(
    urls: &[String],
    output: &Path,
    config: &PipelineConfig,
) -> Result<RunOutput, WebbookError> {
    build_to_file_with(urls, output, config, &HtmlBundleBuilder).await
}

/// Run the pipeline and write the bundled document with a caller-chosen
/// builder.
pub async fn build_to_file_with(
    urls: &[String],
    output: &Path,
    config: &PipelineConfig,
    builder: &dyn DocumentBuilder,
) -> Result<RunOutput, WebbookError> {
    let result = build(urls, config).await?;
    builder
        .build(&result.metadata, &result.chapters, output)
        .await?;
    Ok(result)
}

/// Blocking wrapper around [`build_to_file`] for synchronous callers.
///
/// Must not be called from inside a tokio runtime.
pub fn build_sync(
    urls: &[String],
    output: &Path,
    config: &PipelineConfig,
) -> Result<RunOutput, WebbookError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| WebbookError::Internal(format!("runtime: {e}")))?;
    runtime.block_on(build_to_file(urls, output, config))
}

/// Derive an output filename from the collection title: a lowercased
/// slug plus a timestamp, e.g. `web-articles-collection_1756300000.html`.
pub fn default_output_filename(title: &str) -> PathBuf {
    let slug: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() { "webbook".to_string() } else { slug };

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("{slug}_{timestamp}.html"))
}
