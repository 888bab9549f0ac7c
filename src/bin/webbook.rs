//! CLI binary for webbook.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use webbook::{
    build_to_file, default_output_filename, PipelineConfig, RunProgress,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-page
/// log lines using [indicatif]. Pages within a batch complete
/// out-of-order, so state is keyed by page index.
struct CliProgress {
    bar: ProgressBar,
    /// Per-page wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Fetching");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }
}

impl RunProgress for CliProgress {
    fn on_run_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Building book from {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, index: usize, _total: usize, url: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(url.to_string());
    }

    fn on_page_complete(&self, index: usize, total: usize, ok: bool) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        if !ok {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            if ok { green("✓") } else { red("✗") },
            index + 1,
            total,
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_pages: usize, succeeded: usize) {
        let failed = total_pages.saturating_sub(succeeded);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages processed successfully",
                green("✔"),
                bold(&succeeded.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages processed  ({} became error chapters)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Two articles into one book
  webbook https://example.com/a https://example.com/b -o book.html

  # Comma-separated lists work too
  webbook "https://example.com/a,https://example.com/b"

  # Custom metadata
  webbook --title "Weekend Reading" --author "me" urls.example/post

  # Gentler pacing for a fragile origin
  webbook --batch-size 2 --batch-delay-ms 3000 --page-timeout 60 <urls...>

ENVIRONMENT VARIABLES:
  WEBBOOK_OUTPUT        Output path (same as -o)
  WEBBOOK_TITLE         Collection title
  WEBBOOK_BATCH_SIZE    Addresses per batch
  RUST_LOG              Tracing filter (overrides -v/-q)
"#;

/// Assemble web pages into a single self-contained document.
#[derive(Parser, Debug)]
#[command(
    name = "webbook",
    version,
    about = "Assemble web pages into a single self-contained document",
    long_about = "Fetch a list of web pages, strip navigation and advertising noise, move \
footnotes to the end of each chapter, inline every image as a data URI, and bundle the \
result into one offline-readable HTML document.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Page addresses, space- and/or comma-separated.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Output file. Default: derived from the title plus a timestamp.
    #[arg(short, long, env = "WEBBOOK_OUTPUT")]
    output: Option<PathBuf>,

    /// Collection title.
    #[arg(long, env = "WEBBOOK_TITLE", default_value = "Web Articles Collection")]
    title: String,

    /// Collection author.
    #[arg(long, env = "WEBBOOK_AUTHOR", default_value = "webbook")]
    author: String,

    /// Collection language code.
    #[arg(long, env = "WEBBOOK_LANGUAGE", default_value = "en")]
    language: String,

    /// Addresses per batch.
    #[arg(long, env = "WEBBOOK_BATCH_SIZE", default_value_t = 3)]
    batch_size: usize,

    /// Pause between batches in milliseconds.
    #[arg(long, env = "WEBBOOK_BATCH_DELAY_MS", default_value_t = 1000)]
    batch_delay_ms: u64,

    /// Maximum pages processed simultaneously.
    #[arg(short, long, env = "WEBBOOK_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Maximum simultaneous image downloads per page.
    #[arg(long, env = "WEBBOOK_IMAGE_CONCURRENCY", default_value_t = 4)]
    image_concurrency: usize,

    /// Per-strategy page timeout in seconds.
    #[arg(long, env = "WEBBOOK_PAGE_TIMEOUT", default_value_t = 30)]
    page_timeout: u64,

    /// Retries per page strategy.
    #[arg(long, env = "WEBBOOK_PAGE_RETRIES", default_value_t = 3)]
    page_retries: u32,

    /// Per-strategy image timeout in seconds.
    #[arg(long, env = "WEBBOOK_IMAGE_TIMEOUT", default_value_t = 15)]
    image_timeout: u64,

    /// Retries per image strategy.
    #[arg(long, env = "WEBBOOK_IMAGE_RETRIES", default_value_t = 2)]
    image_retries: u32,

    /// Disable the progress bar.
    #[arg(long, env = "WEBBOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "WEBBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "WEBBOOK_QUIET")]
    quiet: bool,
}

/// Split any comma-separated arguments into individual addresses.
fn expand_urls(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let urls = expand_urls(&cli.urls);
    if urls.is_empty() {
        anyhow::bail!("no addresses given");
    }

    let mut builder = PipelineConfig::builder()
        .title(cli.title.as_str())
        .author(cli.author.as_str())
        .language(cli.language.as_str())
        .batch_size(cli.batch_size)
        .inter_batch_delay_ms(cli.batch_delay_ms)
        .max_concurrent_pages(cli.concurrency)
        .max_concurrent_images_per_page(cli.image_concurrency)
        .page_timeouts(cli.page_timeout, cli.page_retries)
        .image_timeouts(cli.image_timeout, cli.image_retries);

    if show_progress {
        builder = builder.progress(CliProgress::new());
    }
    let config = builder.build().context("Invalid configuration")?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_filename(&cli.title));

    let result = build_to_file(&urls, &output_path, &config)
        .await
        .context("Build failed")?;

    if !cli.quiet {
        let size_mb = std::fs::metadata(&output_path)
            .map(|m| m.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or(0.0);
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}  {}",
            if result.stats.failed_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            result.stats.succeeded_pages,
            result.stats.requested_pages,
            result.stats.total_duration_ms,
            bold(&output_path.display().to_string()),
            dim(&format!("({size_mb:.2} MB)")),
        );
        eprintln!(
            "   {} unique images  /  {} cache hits",
            dim(&result.stats.images_downloaded.to_string()),
            dim(&result.stats.image_cache_hits.to_string()),
        );
    }

    Ok(())
}
