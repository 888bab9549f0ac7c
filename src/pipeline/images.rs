//! Image resolution: download enumerated references in bounded waves
//! and inline them into the markup as self-contained data URIs.
//!
//! ## Why literal substitution?
//!
//! A base64 payload can be megabytes of text; re-parsing the document
//! with it inlined is wasteful and, for some payloads, unsafe. So
//! substitution matches the *original* attribute value as an escaped
//! literal (`src="..."` / `data-src="..."`) and swaps in the data URI
//! without ever touching a DOM. Root-relative sources additionally
//! match their resolved absolute form, since pages sometimes carry both
//! spellings of the same reference.
//!
//! Every failure here is non-fatal: a single image that cannot be
//! retrieved degrades to a textual placeholder; a page where *no*
//! image succeeds has all its `<img>` elements replaced by placeholders.

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::pipeline::fetch::{fetch_with_strategies, Transport};
use crate::pipeline::transform::ImageRef;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use url::Url;

/// A successfully retrieved image, bytes in memory until inlined.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub original_src: String,
    pub resolved_url: String,
    pub alt: String,
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}

/// Run-scoped cache mapping resolved image URLs to downloads.
///
/// Shared across all concurrently running page operations in one run.
/// The first completed download for a URL populates the cache; later
/// identical references observe it without a new attempt. Duplicate
/// in-flight downloads for the same URL are tolerated — the last write
/// simply becomes the entry reused going forward.
#[derive(Debug, Default)]
pub struct ImageCache {
    inner: Mutex<HashMap<String, Arc<DownloadedImage>>>,
    hits: AtomicUsize,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a resolved URL, counting a hit on success.
    pub fn get(&self, resolved_url: &str) -> Option<Arc<DownloadedImage>> {
        let found = self.inner.lock().unwrap().get(resolved_url).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, image: Arc<DownloadedImage>) {
        self.inner
            .lock()
            .unwrap()
            .insert(image.resolved_url.clone(), image);
    }

    /// Distinct downloads recorded so far.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// References served from the cache instead of the network.
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Result of resolving one page's images.
#[derive(Debug)]
pub struct ResolveOutput {
    /// Markup with every successful download inlined.
    pub markup: String,
    /// The downloads that succeeded for this page (cached or fresh).
    pub images: Vec<Arc<DownloadedImage>>,
}

/// Download a page's image references and inline the results.
///
/// Downloads are issued in waves of at most
/// `max_concurrent_images_per_page`; each wave settles fully before the
/// next starts. When zero references succeed, the page falls back to
/// replacing all `<img>` elements with textual placeholders — a
/// deliberately blunt fallback: it also swallows images that were never
/// enumerated (e.g. already-inlined data URIs). Kept as-is because a
/// page of half-broken references reads worse than one of placeholders.
pub async fn resolve_images(
    transport: &dyn Transport,
    markup: String,
    refs: &[ImageRef],
    cache: &ImageCache,
    config: &PipelineConfig,
    scratch: &Path,
) -> ResolveOutput {
    if refs.is_empty() {
        return ResolveOutput {
            markup,
            images: Vec::new(),
        };
    }

    let mut downloaded: Vec<Arc<DownloadedImage>> = Vec::new();
    let wave_size = config.max_concurrent_images_per_page.max(1);

    for wave in refs.chunks(wave_size) {
        let outcomes = join_all(
            wave.iter()
                .map(|r| download_one(transport, r, cache, config, scratch)),
        )
        .await;
        downloaded.extend(outcomes.into_iter().flatten());
    }

    if downloaded.is_empty() {
        debug!("no images retrieved; replacing all img elements with placeholders");
        return ResolveOutput {
            markup: replace_all_images_with_placeholders(&markup),
            images: Vec::new(),
        };
    }

    let mut markup = markup;
    for image in &downloaded {
        markup = inline_image(&markup, image);
    }

    ResolveOutput {
        markup,
        images: downloaded,
    }
}

/// Fetch one reference through the image strategy cascade, consulting
/// the run cache first. Returns `None` when every strategy fails.
async fn download_one(
    transport: &dyn Transport,
    reference: &ImageRef,
    cache: &ImageCache,
    config: &PipelineConfig,
    scratch: &Path,
) -> Option<Arc<DownloadedImage>> {
    if let Some(cached) = cache.get(&reference.resolved_url) {
        debug!("image cache hit: {}", reference.resolved_url);
        return Some(cached);
    }

    match fetch_with_strategies(
        transport,
        &reference.resolved_url,
        &config.image_strategies,
        scratch,
    )
    .await
    {
        Ok(bytes) => {
            let image = Arc::new(DownloadedImage {
                original_src: reference.original_src.clone(),
                resolved_url: reference.resolved_url.clone(),
                alt: reference.alt.clone(),
                media_type: media_type_for(&reference.resolved_url),
                bytes,
            });
            cache.insert(Arc::clone(&image));
            debug!(
                "downloaded image {} ({} bytes)",
                image.resolved_url,
                image.bytes.len()
            );
            Some(image)
        }
        Err(FetchError::Exhausted { last, .. }) => {
            warn!(
                "image download failed, will degrade to placeholder: {} ({last})",
                reference.resolved_url
            );
            None
        }
        Err(e) => {
            warn!("image download failed: {} ({e})", reference.resolved_url);
            None
        }
    }
}

// ── Media types ──────────────────────────────────────────────────────────

/// Fixed extension-to-media-type table. Unrecognised extensions fall
/// back to the generic image type.
pub fn media_type_for(resolved_url: &str) -> &'static str {
    let ext = Url::parse(resolved_url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
        })
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "image/jpeg",
    }
}

// ── Substitution ─────────────────────────────────────────────────────────

/// Replace every literal `src`/`data-src` occurrence of the image's
/// original attribute value with an embedded data URI.
fn inline_image(markup: &str, image: &DownloadedImage) -> String {
    if image.bytes.is_empty() {
        // nothing to embed; leave a visible marker instead of a broken ref
        return substitute_attr(
            markup,
            &image.original_src,
            &format!("alt=\"[{}]\"", placeholder_alt(&image.alt)),
        );
    }

    let data_uri = format!(
        "data:{};base64,{}",
        image.media_type,
        STANDARD.encode(&image.bytes)
    );
    let replacement = format!("src=\"{data_uri}\"");

    let mut out = substitute_attr(markup, &image.original_src, &replacement);
    if image.original_src.starts_with('/') && image.original_src != image.resolved_url {
        // pages occasionally spell the same reference absolutely
        out = substitute_attr(&out, &image.resolved_url, &replacement);
    }
    out
}

fn substitute_attr(markup: &str, original_src: &str, replacement: &str) -> String {
    let pattern = format!(
        r#"(?i)(?:src|data-src)\s*=\s*["']{}["']"#,
        regex::escape(original_src)
    );
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(markup, NoExpand(replacement)).into_owned(),
        Err(e) => {
            warn!("substitution pattern failed for '{original_src}': {e}");
            markup.to_string()
        }
    }
}

static RE_IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<img\b[^>]*>").unwrap());
static RE_ALT_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"alt\s*=\s*["']([^"']*)["']"#).unwrap());

fn placeholder_alt(alt: &str) -> &str {
    if alt.trim().is_empty() {
        "Image"
    } else {
        alt
    }
}

/// Page-level fallback when zero images could be retrieved: every
/// remaining `<img>` element becomes a short textual placeholder built
/// from its alt text.
pub fn replace_all_images_with_placeholders(markup: &str) -> String {
    RE_IMG_TAG
        .replace_all(markup, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let alt = RE_ALT_ATTR
                .captures(tag)
                .map(|c| c[1].to_string())
                .unwrap_or_default();
            format!("<p><em>[{}]</em></p>", placeholder_alt(&alt))
        })
        .into_owned()
}
