//! # webbook
//!
//! Turn a list of web addresses into a single, self-contained document.
//!
//! Each page is fetched through a cascade of retrieval strategies,
//! cleaned of navigation and advertising noise, its footnotes and
//! annotations relocated to the end of the chapter, and its images
//! downloaded and inlined as data URIs — so the assembled document
//! renders offline with no external references. Pages are processed in
//! bounded-concurrency batches and always come back in input order;
//! a page that cannot be retrieved becomes an error chapter rather
//! than a hole in the book.
//!
//! ```text
//! addresses ──▶ batch ──▶ [fetch ──▶ transform ──▶ images] ──▶ chapters ──▶ book
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use webbook::{build_to_file, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), webbook::WebbookError> {
//!     let config = PipelineConfig::builder()
//!         .title("Weekend Reading")
//!         .batch_size(3)
//!         .build()?;
//!
//!     let urls = vec![
//!         "https://example.com/article-one".to_string(),
//!         "https://example.com/article-two".to_string(),
//!     ];
//!     let output = build_to_file(&urls, Path::new("weekend.html"), &config).await?;
//!     println!(
//!         "{}/{} pages in {} ms",
//!         output.stats.succeeded_pages,
//!         output.stats.requested_pages,
//!         output.stats.total_duration_ms
//!     );
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod book;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod run;

pub use book::{DocumentBuilder, HtmlBundleBuilder};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{FetchError, PageError, WebbookError};
pub use output::{BookMetadata, Chapter, RunOutput, RunStats};
pub use pipeline::fetch::{FetchStrategy, HttpTransport, Transport};
pub use progress::RunProgress;
pub use run::{build, build_sync, build_to_file, build_to_file_with, default_output_filename};
