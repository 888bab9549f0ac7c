//! Batch orchestration: bounded-concurrency page processing with order
//! preservation and per-item failure isolation.
//!
//! Addresses are partitioned into fixed-size consecutive groups; every
//! member of a group is processed concurrently and the group settles
//! fully before the next one starts, with a pacing delay in between.
//! Failures never shrink the output: a failed page becomes an error
//! chapter at its original index, so the chapter list is always exactly
//! as long as the address list and in the same order — independent of
//! completion order within a group.

use crate::config::PipelineConfig;
use crate::output::Chapter;
use crate::pipeline::fetch::Transport;
use crate::pipeline::images::ImageCache;
use crate::pipeline::page::{self, PageOutcome};
use futures::future::join_all;
use std::path::Path;
use tracing::{info, warn};

/// Aggregated result of running all batches.
#[derive(Debug)]
pub struct BatchReport {
    /// One chapter per address, input order.
    pub chapters: Vec<Chapter>,
    pub succeeded_pages: usize,
    pub failed_pages: usize,
    /// Total image downloads attributed to pages (cache hits included).
    pub images_collected: usize,
}

/// Process every address, in groups, and return ordered chapters.
pub async fn run_batches(
    transport: &dyn Transport,
    urls: &[String],
    cache: &ImageCache,
    config: &PipelineConfig,
    scratch: &Path,
) -> BatchReport {
    let total = urls.len();
    let group_size = config.group_size();
    let group_count = total.div_ceil(group_size);
    info!("processing {total} addresses in {group_count} groups of up to {group_size}");

    if let Some(ref progress) = config.progress {
        progress.on_run_start(total);
    }

    let mut slots: Vec<Option<Chapter>> = (0..total).map(|_| None).collect();
    let mut succeeded = 0usize;
    let mut images_collected = 0usize;

    for (group_idx, group) in urls.chunks(group_size).enumerate() {
        if group_idx > 0 && !config.inter_batch_delay.is_zero() {
            tokio::time::sleep(config.inter_batch_delay).await;
        }

        let base = group_idx * group_size;
        info!(
            "group {}/{}: pages {}..{}",
            group_idx + 1,
            group_count,
            base,
            base + group.len() - 1
        );

        let outcomes = join_all(group.iter().enumerate().map(|(offset, url)| {
            let index = base + offset;
            async move {
                if let Some(ref progress) = config.progress {
                    progress.on_page_start(index, total, url);
                }
                page::process_page(transport, url, index, cache, config, scratch).await
            }
        }))
        .await;

        for outcome in outcomes {
            let ok = outcome.error.is_none();
            if let Some(ref progress) = config.progress {
                progress.on_page_complete(outcome.index, total, ok);
            }
            if ok {
                succeeded += 1;
            }
            images_collected += outcome.images.len();
            let index = outcome.index;
            slots[index] = Some(settle(outcome));
        }
    }

    if let Some(ref progress) = config.progress {
        progress.on_run_complete(total, succeeded);
    }

    let chapters: Vec<Chapter> = slots
        .into_iter()
        .map(|slot| slot.expect("every index settles exactly once"))
        .collect();

    BatchReport {
        failed_pages: total - succeeded,
        succeeded_pages: succeeded,
        images_collected,
        chapters,
    }
}

/// Convert a settled outcome into its chapter, synthesising an error
/// chapter for failures so ordering and length invariants always hold.
fn settle(outcome: PageOutcome) -> Chapter {
    match (outcome.chapter, outcome.error) {
        (Some(chapter), _) => chapter,
        (None, error) => {
            let detail = error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown failure".to_string());
            warn!("page {} rendered as error chapter: {detail}", outcome.index);
            error_chapter(&outcome.url, &detail)
        }
    }
}

/// The chapter shown in place of a page that could not be processed.
pub fn error_chapter(url: &str, detail: &str) -> Chapter {
    Chapter {
        title: format!("Error: {url}"),
        content: format!(
            "<h1>Failed to load content</h1>\
             <p>Error: {detail}</p>\
             <p>URL: <a href=\"{url}\">{url}</a></p>"
        ),
        source_url: url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chapter_names_address_and_cause() {
        let c = error_chapter("https://x.example", "all strategies exhausted");
        assert!(c.title.contains("https://x.example"));
        assert!(c.content.contains("all strategies exhausted"));
        assert_eq!(c.source_url, "https://x.example");
    }
}
