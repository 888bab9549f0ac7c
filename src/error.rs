//! Error types for the webbook library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`WebbookError`] — **Fatal**: the run cannot proceed at all (no
//!   addresses given, output file unwritable). Returned as
//!   `Err(WebbookError)` from the top-level `build*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (every fetch
//!   strategy exhausted, transport glitch) but all other pages are fine.
//!   The batch orchestrator converts it into an error chapter so the
//!   final document always contains one chapter per requested address.
//!
//! Image-level failures never reach either type: the image resolver
//! absorbs them and degrades the affected references to placeholders.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the webbook library.
///
/// Page-level failures use [`PageError`] and are converted into error
/// chapters rather than propagated here.
#[derive(Debug, Error)]
pub enum WebbookError {
    /// The caller supplied an empty address list.
    #[error("No addresses provided.\nPass at least one URL to build a document from.")]
    NoAddresses,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored on the page outcome when processing fails. The overall run
/// continues; the orchestrator renders the failure as an error chapter
/// at the page's original position.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Every fetch strategy was exhausted for the page address.
    #[error("Page {index}: all {strategies} fetch strategies failed for '{url}': {detail}")]
    FetchFailed {
        index: usize,
        url: String,
        strategies: usize,
        detail: String,
    },
}

/// A failure inside the fetch-strategy interpreter.
///
/// Internal to the retrieval layer; the page processor wraps it into
/// [`PageError::FetchFailed`] and the image resolver absorbs it.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The transport reported an error (HTTP failure, curl exit, I/O).
    #[error("transport error: {0}")]
    Transport(String),

    /// The strategy completed but produced a zero-length body.
    #[error("empty response body")]
    Empty,

    /// Every strategy in the cascade failed; carries the last error.
    #[error("all {strategies} strategies exhausted: {last}")]
    Exhausted { strategies: usize, last: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_addresses_display() {
        let e = WebbookError::NoAddresses;
        assert!(e.to_string().contains("No addresses"));
    }

    #[test]
    fn fetch_failed_display() {
        let e = PageError::FetchFailed {
            index: 2,
            url: "https://example.com/a".into(),
            strategies: 4,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 2"), "got: {msg}");
        assert!(msg.contains("https://example.com/a"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn exhausted_display() {
        let e = FetchError::Exhausted {
            strategies: 2,
            last: "timeout".into(),
        };
        assert!(e.to_string().contains("2 strategies"));
        assert!(e.to_string().contains("timeout"));
    }
}
