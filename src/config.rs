//! Configuration for a pipeline run.
//!
//! Every knob lives in one [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. A flat struct with documented defaults is
//! trivial to share across tasks and to diff between two runs when
//! their outputs differ; the builder lets callers set only what they
//! care about.

use crate::error::WebbookError;
use crate::output::BookMetadata;
use crate::pipeline::fetch::{
    default_image_strategies, default_page_strategies, FetchStrategy, Transport,
};
use crate::progress::RunProgress;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_RETRIES: u32 = 3;
const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_IMAGE_RETRIES: u32 = 2;

/// Configuration for building a document from a list of addresses.
///
/// # Example
/// ```rust
/// use webbook::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .batch_size(5)
///     .max_concurrent_pages(5)
///     .inter_batch_delay_ms(500)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Maximum pages processed simultaneously within a batch. Default: 4.
    ///
    /// Pages are network-bound; a handful in flight cuts wall-clock time
    /// substantially without hammering any single origin.
    pub max_concurrent_pages: usize,

    /// Maximum simultaneous image downloads per page. Default: 4.
    ///
    /// Image sets are bursty — one article can reference dozens. Waves
    /// of four keep per-host connection counts polite while still
    /// overlapping transfer latency.
    pub max_concurrent_images_per_page: usize,

    /// Addresses per batch. Default: 3.
    ///
    /// The effective group size is `min(batch_size,
    /// max_concurrent_pages)`; each group settles fully before the next
    /// starts.
    pub batch_size: usize,

    /// Pause between batches. Default: 1000 ms.
    ///
    /// Gives origin servers breathing room between bursts. Set to zero
    /// in tests.
    pub inter_batch_delay: Duration,

    /// Strategy cascade for page retrieval, tried in order.
    pub page_strategies: Vec<FetchStrategy>,

    /// Strategy cascade for image downloads, tried in order.
    pub image_strategies: Vec<FetchStrategy>,

    /// Metadata handed to the document builder.
    pub metadata: BookMetadata,

    /// Transport override. `None` uses the HTTP/curl default; tests
    /// inject scripted transports here.
    pub transport: Option<Arc<dyn Transport>>,

    /// Optional progress callback.
    pub progress: Option<Arc<dyn RunProgress>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pages: 4,
            max_concurrent_images_per_page: 4,
            batch_size: 3,
            inter_batch_delay: Duration::from_millis(1000),
            page_strategies: default_page_strategies(DEFAULT_PAGE_TIMEOUT_SECS, DEFAULT_PAGE_RETRIES),
            image_strategies: default_image_strategies(
                DEFAULT_IMAGE_TIMEOUT_SECS,
                DEFAULT_IMAGE_RETRIES,
            ),
            metadata: BookMetadata::default(),
            transport: None,
            progress: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_concurrent_pages", &self.max_concurrent_pages)
            .field(
                "max_concurrent_images_per_page",
                &self.max_concurrent_images_per_page,
            )
            .field("batch_size", &self.batch_size)
            .field("inter_batch_delay", &self.inter_batch_delay)
            .field("page_strategies", &self.page_strategies)
            .field("image_strategies", &self.image_strategies)
            .field("metadata", &self.metadata)
            .field("transport", &self.transport.as_ref().map(|_| "<dyn Transport>"))
            .field("progress", &self.progress.as_ref().map(|_| "<dyn RunProgress>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective concurrent group size for the batch orchestrator.
    pub fn group_size(&self) -> usize {
        self.batch_size.min(self.max_concurrent_pages).max(1)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_concurrent_pages(mut self, n: usize) -> Self {
        self.config.max_concurrent_pages = n.max(1);
        self
    }

    pub fn max_concurrent_images_per_page(mut self, n: usize) -> Self {
        self.config.max_concurrent_images_per_page = n.max(1);
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn inter_batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.inter_batch_delay = Duration::from_millis(ms);
        self
    }

    /// Rebuild the default page cascade with a different per-strategy
    /// timeout and retry count.
    pub fn page_timeouts(mut self, timeout_secs: u64, retries: u32) -> Self {
        self.config.page_strategies = default_page_strategies(timeout_secs, retries);
        self
    }

    /// Rebuild the default image cascade with a different per-strategy
    /// timeout and retry count.
    pub fn image_timeouts(mut self, timeout_secs: u64, retries: u32) -> Self {
        self.config.image_strategies = default_image_strategies(timeout_secs, retries);
        self
    }

    /// Replace the page strategy cascade entirely.
    pub fn page_strategies(mut self, strategies: Vec<FetchStrategy>) -> Self {
        self.config.page_strategies = strategies;
        self
    }

    /// Replace the image strategy cascade entirely.
    pub fn image_strategies(mut self, strategies: Vec<FetchStrategy>) -> Self {
        self.config.image_strategies = strategies;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.metadata.title = title.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.metadata.author = author.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.metadata.language = language.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress(mut self, progress: Arc<dyn RunProgress>) -> Self {
        self.config.progress = Some(progress);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, WebbookError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(WebbookError::InvalidConfig("batch_size must be ≥ 1".into()));
        }
        if c.max_concurrent_pages == 0 {
            return Err(WebbookError::InvalidConfig(
                "max_concurrent_pages must be ≥ 1".into(),
            ));
        }
        if c.page_strategies.is_empty() {
            return Err(WebbookError::InvalidConfig(
                "at least one page fetch strategy is required".into(),
            ));
        }
        if c.image_strategies.is_empty() {
            return Err(WebbookError::InvalidConfig(
                "at least one image fetch strategy is required".into(),
            ));
        }
        Ok(self.config)
    }
}
