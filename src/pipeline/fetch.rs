//! Retrieval: fetch raw bytes for a URL through a cascade of strategies.
//!
//! ## Why a strategy cascade?
//!
//! Pages that load fine in a browser routinely fail a naive HTTP GET:
//! broken certificate chains, corporate proxies injecting themselves,
//! HTTPS endpoints that only answer over plain HTTP, servers that reject
//! unfamiliar TLS stacks. Instead of one heavily-tuned request, the
//! retriever walks an ordered list of [`FetchStrategy`] descriptors and
//! stops at the first one that yields a non-empty body. The list is
//! data, not code — [`fetch_with_strategies`] is a small interpreter
//! over it, so the cascade can be reordered, shortened, or replayed
//! against a scripted transport in tests.
//!
//! The final fallback shells out to `curl`, which carries its own TLS
//! stack and proxy handling and succeeds on a surprising number of
//! hosts that refuse everything else.

use crate::error::FetchError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Browser-like User-Agent sent with every request. Many hosts serve an
/// empty shell or a block page to clients that identify as a script.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One configured method of fetching bytes for a URL.
///
/// Strategies are plain data: transport options plus a timeout and a
/// bounded retry count. They are tried in declaration order with
/// early-exit on the first non-empty success.
#[derive(Debug, Clone)]
pub struct FetchStrategy {
    /// Short name used in log lines.
    pub label: &'static str,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempts before advancing to the next strategy (≥ 1).
    pub retries: u32,
    /// Skip TLS certificate validation.
    pub accept_invalid_certs: bool,
    /// Ignore proxy environment variables and connect directly.
    pub disable_proxy: bool,
    /// Rewrite `https://` to `http://` before requesting.
    pub downgrade_to_http: bool,
    /// Fetch via a `curl` subprocess instead of the HTTP client.
    pub via_curl: bool,
}

impl FetchStrategy {
    fn base(label: &'static str, timeout_secs: u64, retries: u32) -> Self {
        Self {
            label,
            timeout: Duration::from_secs(timeout_secs),
            retries: retries.max(1),
            accept_invalid_certs: false,
            disable_proxy: false,
            downgrade_to_http: false,
            via_curl: false,
        }
    }
}

/// The default cascade for page retrieval, in order:
/// relaxed-TLS direct fetch, proxy-disabled fetch, HTTP-downgraded
/// fetch, and finally a `curl` subprocess.
pub fn default_page_strategies(timeout_secs: u64, retries: u32) -> Vec<FetchStrategy> {
    vec![
        FetchStrategy {
            accept_invalid_certs: true,
            ..FetchStrategy::base("direct", timeout_secs, retries)
        },
        FetchStrategy {
            accept_invalid_certs: true,
            disable_proxy: true,
            ..FetchStrategy::base("no-proxy", timeout_secs, retries)
        },
        FetchStrategy {
            accept_invalid_certs: true,
            downgrade_to_http: true,
            ..FetchStrategy::base("http-downgrade", timeout_secs, retries)
        },
        FetchStrategy {
            via_curl: true,
            ..FetchStrategy::base("curl", timeout_secs, retries)
        },
    ]
}

/// The default cascade for image downloads: shorter timeouts and fewer
/// attempts, since a missing image degrades to a placeholder instead of
/// failing the page.
pub fn default_image_strategies(timeout_secs: u64, retries: u32) -> Vec<FetchStrategy> {
    vec![
        FetchStrategy {
            accept_invalid_certs: true,
            ..FetchStrategy::base("direct", timeout_secs, retries)
        },
        FetchStrategy {
            via_curl: true,
            ..FetchStrategy::base("curl", timeout_secs, 1)
        },
    ]
}

/// Fetch raw bytes for a URL using one strategy's transport options.
///
/// Implemented by [`HttpTransport`] for real runs; tests inject scripted
/// implementations to exercise the orchestration layers without network
/// access. `scratch` is a run-scoped temp directory a transport may use
/// for subprocess output files.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        strategy: &FetchStrategy,
        scratch: &Path,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Default transport: `reqwest` for HTTP strategies, `curl` for
/// [`FetchStrategy::via_curl`].
#[derive(Debug, Default)]
pub struct HttpTransport;

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        strategy: &FetchStrategy,
        scratch: &Path,
    ) -> Result<Vec<u8>, FetchError> {
        let url = if strategy.downgrade_to_http {
            url.replacen("https://", "http://", 1)
        } else {
            url.to_string()
        };

        if strategy.via_curl {
            fetch_via_curl(&url, strategy, scratch).await
        } else {
            fetch_via_http(&url, strategy).await
        }
    }
}

async fn fetch_via_http(url: &str, strategy: &FetchStrategy) -> Result<Vec<u8>, FetchError> {
    let mut builder = reqwest::Client::builder()
        .timeout(strategy.timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5));

    if strategy.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if strategy.disable_proxy {
        builder = builder.no_proxy();
    }

    let client = builder
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Transport(format!("HTTP {status}")));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    Ok(bytes.to_vec())
}

/// Shell out to `curl`, writing to a file under `scratch`.
///
/// curl writes to a file rather than stdout so a partial body from a
/// killed transfer never masquerades as a complete response: the file
/// is read back only after curl exits zero.
async fn fetch_via_curl(
    url: &str,
    strategy: &FetchStrategy,
    scratch: &Path,
) -> Result<Vec<u8>, FetchError> {
    let out_path = scratch.join(format!("curl_{}.bin", nanos_now()));

    let status = Command::new("curl")
        .arg("-L")
        .arg("--max-time")
        .arg(strategy.timeout.as_secs().to_string())
        .arg("--user-agent")
        .arg(USER_AGENT)
        .arg("--insecure")
        .arg("--max-redirs")
        .arg("5")
        .arg("--silent")
        .arg("--show-error")
        .arg("--fail")
        .arg("-o")
        .arg(&out_path)
        .arg(url)
        .status()
        .await
        .map_err(|e| FetchError::Transport(format!("curl spawn failed: {e}")))?;

    if !status.success() {
        let _ = tokio::fs::remove_file(&out_path).await;
        return Err(FetchError::Transport(format!("curl exited with {status}")));
    }

    let bytes = tokio::fs::read(&out_path)
        .await
        .map_err(|e| FetchError::Transport(format!("curl output unreadable: {e}")))?;
    let _ = tokio::fs::remove_file(&out_path).await;

    Ok(bytes)
}

fn nanos_now() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Run the strategy cascade for one URL.
///
/// Each strategy gets up to `retries` attempts with a short linear pause
/// between them. A zero-length body counts as failure and the cascade
/// advances. The first non-empty body wins; nothing beyond "parses as
/// bytes" is validated here. Exhausting every strategy yields
/// [`FetchError::Exhausted`] carrying the last error — callers must not
/// treat that as fatal to the whole run.
pub async fn fetch_with_strategies(
    transport: &dyn Transport,
    url: &str,
    strategies: &[FetchStrategy],
    scratch: &Path,
) -> Result<Vec<u8>, FetchError> {
    let mut last: Option<FetchError> = None;

    for (s_idx, strategy) in strategies.iter().enumerate() {
        for attempt in 0..strategy.retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }

            debug!(
                "fetch {url}: strategy {}/{} '{}' attempt {}/{}",
                s_idx + 1,
                strategies.len(),
                strategy.label,
                attempt + 1,
                strategy.retries
            );

            match transport.fetch(url, strategy, scratch).await {
                Ok(bytes) if bytes.is_empty() => {
                    warn!("fetch {url}: strategy '{}' returned empty body", strategy.label);
                    last = Some(FetchError::Empty);
                }
                Ok(bytes) => {
                    debug!(
                        "fetch {url}: strategy '{}' succeeded ({} bytes)",
                        strategy.label,
                        bytes.len()
                    );
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!("fetch {url}: strategy '{}' failed: {e}", strategy.label);
                    last = Some(e);
                }
            }
        }
    }

    Err(FetchError::Exhausted {
        strategies: strategies.len(),
        last: last
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no strategies configured".to_string()),
    })
}
