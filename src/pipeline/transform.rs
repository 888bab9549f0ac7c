//! Markup transformation: noise stripping, annotation relocation,
//! blockquote decoration, and image-reference enumeration.
//!
//! ## Why string surgery instead of DOM mutation?
//!
//! `scraper` exposes a read-only DOM. Rather than pulling in a mutable
//! tree, each pass re-serialises the document once and edits it by
//! replacing an element's exact serialised form. Because both the
//! snippet and the document come from the same serialiser, the snippet
//! is guaranteed to appear verbatim. This also matches how image
//! substitution must work later anyway: data-URI payloads are not safe
//! to re-parse mid-transform, so the whole pipeline stays literal-text
//! based. Passes re-parse between edits so every pass sees consistent
//! markup.
//!
//! Transformation never fails: unparseable input degrades to a page
//! with a placeholder title and whatever content survived parsing.

use crate::pipeline::classify::{self, FootnoteKind, NoteCategory};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Title used when a page has neither a `<title>` nor any heading.
pub const DEFAULT_TITLE: &str = "Untitled";

/// One image reference found during transformation.
///
/// `original_src` is the exact attribute value as it appeared in the
/// markup; substitution later matches on it literally, so it must never
/// be normalised. `resolved_url` is the absolute, scheme-qualified
/// form used for downloading and cache keying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub original_src: String,
    pub resolved_url: String,
    pub alt: String,
}

/// A side-note, footnote, or citation relocated to the document end.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Anchor id of the end-of-document container.
    pub id: String,
    /// Anchor id of the in-text `[n]` marker.
    pub back_ref_id: String,
    /// Per-page sequence number, starting at 1.
    pub seq: usize,
    pub category: NoteCategory,
    /// Extracted plain text, whitespace-normalised.
    pub content: String,
}

/// Result of transforming one page's raw markup.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub title: String,
    /// Cleaned markup. Image attributes still carry their original
    /// values; rewriting is the image resolver's job.
    pub markup: String,
    pub images: Vec<ImageRef>,
    pub annotations: Vec<Annotation>,
}

/// Per-page annotation sequence state, reset for every page.
/// Threaded explicitly through the relocation pass so nothing is shared
/// across concurrently transforming pages.
struct AnnoState {
    page_index: usize,
    next_seq: usize,
    annotations: Vec<Annotation>,
}

impl AnnoState {
    fn new(page_index: usize) -> Self {
        Self {
            page_index,
            next_seq: 1,
            annotations: Vec::new(),
        }
    }

    /// Record a new annotation and return the in-text anchor markup.
    fn record(&mut self, category: NoteCategory, content: String) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = format!("wb-note-{}-{}", self.page_index, seq);
        let back_ref_id = format!("wb-note-ref-{}-{}", self.page_index, seq);
        let anchor = format!(
            "<a class=\"note-ref\" id=\"{back_ref_id}\" href=\"#{id}\">[{seq}]</a>"
        );
        self.annotations.push(Annotation {
            id,
            back_ref_id,
            seq,
            category,
            content,
        });
        anchor
    }
}

/// Transform one page's raw markup.
///
/// Steps run in a fixed order (each depends on its predecessors):
/// title extraction, noise stripping, annotation relocation, blockquote
/// decoration, image enumeration, end-of-document annotation block.
pub fn transform(raw: &str, base_url: &str, page_index: usize) -> TransformOutput {
    let doc = Html::parse_document(raw);

    let title = extract_title(&doc);
    let markup = strip_noise(&doc);

    let mut state = AnnoState::new(page_index);
    let markup = relocate_annotations(&markup, &mut state);
    let markup = decorate_blockquotes(&markup);
    let images = enumerate_images(&markup, base_url);
    let markup = append_annotation_block(markup, &state.annotations);

    debug!(
        "transform page {page_index}: title={title:?}, {} images, {} annotations",
        images.len(),
        state.annotations.len()
    );

    TransformOutput {
        title,
        markup,
        images,
        annotations: state.annotations,
    }
}

// ── Step 1: title ────────────────────────────────────────────────────────

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static HEADING_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3").unwrap());

fn extract_title(doc: &Html) -> String {
    if let Some(t) = doc.select(&TITLE_SEL).next() {
        let text = collapse_ws(&t.text().collect::<String>());
        if !text.is_empty() {
            return text;
        }
    }
    if let Some(h) = doc.select(&HEADING_SEL).next() {
        let text = collapse_ws(&h.text().collect::<String>());
        if !text.is_empty() {
            return text;
        }
    }
    DEFAULT_TITLE.to_string()
}

// ── Step 2: noise stripping ──────────────────────────────────────────────

/// Matches serialised inline style attributes. The serialiser always
/// emits double-quoted attributes, so one pattern suffices.
static RE_STYLE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\s+style="([^"]*)""#).unwrap());

fn strip_noise(doc: &Html) -> String {
    let mut out = doc.html();

    let mut snippets = Vec::new();
    collect_noise(doc.root_element(), &mut snippets);
    for snippet in snippets {
        out = out.replacen(&snippet, "", 1);
    }

    // Inline styles go too, except values carrying a background-image:
    // the image pass still needs to see those.
    RE_STYLE_ATTR
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            if caps[1].contains("background-image") {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Depth-first walk collecting noise elements' serialised forms.
/// A matched subtree is recorded whole and not descended into.
fn collect_noise(el: ElementRef<'_>, acc: &mut Vec<String>) {
    let v = el.value();
    let tag = v.name();
    let class_attr = v.attr("class").unwrap_or("");
    let id_attr = v.attr("id").unwrap_or("");

    if !matches!(tag, "html" | "head" | "body") && classify::is_noise(tag, class_attr, id_attr) {
        acc.push(el.html());
        return;
    }
    for child in el.children().filter_map(ElementRef::wrap) {
        collect_noise(child, acc);
    }
}

// ── Steps 3–4: annotation and footnote relocation ────────────────────────

enum Edit {
    /// Replace the element's serialised form with an anchor link.
    Replace { snippet: String, with: String },
    /// Insert a heading before a footnote container, leaving it in place.
    HeadBefore { snippet: String, heading: String },
}

fn relocate_annotations(html: &str, state: &mut AnnoState) -> String {
    let doc = Html::parse_document(html);
    let mut out = doc.html();
    let mut edits = Vec::new();

    collect_annotation_edits(doc.root_element(), state, &mut edits);

    for edit in edits {
        match edit {
            Edit::Replace { snippet, with } => {
                out = out.replacen(&snippet, &with, 1);
            }
            Edit::HeadBefore { snippet, heading } => {
                let combined = format!("{heading}{snippet}");
                out = out.replacen(&snippet, &combined, 1);
            }
        }
    }
    out
}

fn collect_annotation_edits(el: ElementRef<'_>, state: &mut AnnoState, edits: &mut Vec<Edit>) {
    let v = el.value();
    let tag = v.name();
    let class_attr = v.attr("class").unwrap_or("");
    let id_attr = v.attr("id").unwrap_or("");
    let role_attr = v.attr("role").unwrap_or("");

    if let Some(category) = classify::annotation_category(tag, class_attr, role_attr) {
        let content = collapse_ws(&el.text().collect::<String>());
        let anchor = state.record(category, content);
        edits.push(Edit::Replace {
            snippet: el.html(),
            with: anchor,
        });
        return; // nested annotations fold into the outermost match
    }

    match classify::footnote_kind(tag, class_attr, id_attr) {
        Some(FootnoteKind::Container) => {
            edits.push(Edit::HeadBefore {
                snippet: el.html(),
                heading: "<h4 class=\"footnotes-heading\">Notes and References</h4>".to_string(),
            });
            // entries inside still get relocated individually
        }
        Some(FootnoteKind::Entry) => {
            let content = collapse_ws(&el.text().collect::<String>());
            let anchor = state.record(NoteCategory::Generic, content);
            edits.push(Edit::Replace {
                snippet: el.html(),
                with: anchor,
            });
            return;
        }
        None => {}
    }

    for child in el.children().filter_map(ElementRef::wrap) {
        collect_annotation_edits(child, state, edits);
    }
}

// ── Step 5: blockquote decoration ────────────────────────────────────────

static BLOCKQUOTE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("blockquote").unwrap());
static CITE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("cite").unwrap());

fn decorate_blockquotes(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = doc.html();

    for bq in doc.select(&BLOCKQUOTE_SEL) {
        let snippet = bq.html();
        let cite = bq
            .select(&CITE_SEL)
            .next()
            .map(|c| collapse_ws(&c.text().collect::<String>()))
            .filter(|t| !t.is_empty());
        let decorated = decorate_blockquote(&snippet, cite.as_deref());
        out = out.replacen(&snippet, &decorated, 1);
    }
    out
}

/// Splice the `[quote]` marker after the opening tag and an optional
/// source line before the closing tag, preserving original attributes.
fn decorate_blockquote(snippet: &str, cite: Option<&str>) -> String {
    let open_end = match snippet.find('>') {
        Some(i) => i,
        None => return snippet.to_string(),
    };
    let close = snippet.rfind("</blockquote>").unwrap_or(snippet.len());

    let mut s = String::with_capacity(snippet.len() + 96);
    s.push_str(&snippet[..=open_end]);
    s.push_str("<p class=\"quote-marker\"><strong>[quote]</strong></p>");
    s.push_str(&snippet[open_end + 1..close]);
    if let Some(c) = cite {
        s.push_str(&format!(
            "<p class=\"quote-source\">Source: {}</p>",
            escape_html(c)
        ));
    }
    s.push_str(&snippet[close..]);
    s
}

// ── Step 6: image enumeration ────────────────────────────────────────────

static IMG_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static STYLED_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("[style]").unwrap());
static PICTURE_SOURCE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("picture source").unwrap());
static RE_BG_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"background-image\s*:\s*url\((['"]?)([^'")]+)['"]?\)"#).unwrap());

fn enumerate_images(html: &str, base_url: &str) -> Vec<ImageRef> {
    let base = match Url::parse(base_url) {
        Ok(u) => u,
        Err(e) => {
            warn!("cannot resolve images: bad base address '{base_url}': {e}");
            return Vec::new();
        }
    };

    let doc = Html::parse_document(html);
    let mut refs: Vec<ImageRef> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut add = |original: &str, alt: &str, refs: &mut Vec<ImageRef>, seen: &mut HashSet<String>| {
        if original.is_empty() || original.starts_with("data:") {
            return;
        }
        match resolve_src(&base, original) {
            Ok(resolved) => {
                if seen.insert(resolved.clone()) {
                    refs.push(ImageRef {
                        original_src: original.to_string(),
                        resolved_url: resolved,
                        alt: alt.to_string(),
                    });
                }
            }
            Err(e) => warn!("skipping unresolvable image source '{original}': {e}"),
        }
    };

    for img in doc.select(&IMG_SEL) {
        let v = img.value();
        let src = v.attr("src").filter(|s| !s.is_empty()).or(v.attr("data-src"));
        if let Some(src) = src {
            add(src, v.attr("alt").unwrap_or(""), &mut refs, &mut seen);
        }
    }

    for el in doc.select(&STYLED_SEL) {
        let style = el.value().attr("style").unwrap_or("");
        if let Some(caps) = RE_BG_URL.captures(style) {
            add(&caps[2], el.value().attr("alt").unwrap_or(""), &mut refs, &mut seen);
        }
    }

    for source in doc.select(&PICTURE_SOURCE_SEL) {
        let Some(srcset) = source.value().attr("srcset") else {
            continue;
        };
        // first URL of the source-set stands in for the whole element
        let first = srcset
            .split(',')
            .next()
            .and_then(|entry| entry.split_whitespace().next())
            .unwrap_or("");
        let alt = source
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|picture| picture.select(&IMG_SEL).next())
            .and_then(|img| img.value().attr("alt"))
            .unwrap_or("");
        add(first, alt, &mut refs, &mut seen);
    }

    refs
}

/// Resolve an image source against the page address.
///
/// Protocol-relative sources get the page's scheme; root-relative and
/// relative sources join against the base; absolute sources pass
/// through a parse for validation.
pub fn resolve_src(base: &Url, src: &str) -> Result<String, url::ParseError> {
    let resolved = if src.starts_with("//") {
        Url::parse(&format!("{}:{}", base.scheme(), src))?
    } else if src.starts_with("http://") || src.starts_with("https://") {
        Url::parse(src)?
    } else {
        base.join(src)?
    };
    Ok(resolved.to_string())
}

// ── Step 7: end-of-document annotation block ─────────────────────────────

fn append_annotation_block(markup: String, annotations: &[Annotation]) -> String {
    if annotations.is_empty() {
        return markup;
    }

    let mut block = String::from("<hr/><section class=\"page-notes\"><h3>Notes</h3>");
    for a in annotations {
        block.push_str(&format!(
            "<div class=\"note {css}\" id=\"{id}\" \
             style=\"border-left:4px solid {color};padding-left:8px\">\
             <a href=\"#{back}\">[{seq}]</a> <strong>{label}:</strong> {content}</div>",
            css = a.category.css_class(),
            id = a.id,
            color = a.category.color(),
            back = a.back_ref_id,
            seq = a.seq,
            label = a.category,
            content = escape_html(&a.content),
        ));
    }
    block.push_str("</section>");

    match markup.rfind("</body>") {
        Some(pos) => {
            let mut out = markup;
            out.insert_str(pos, &block);
            out
        }
        None => markup + &block,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://site.example/a/b";

    #[test]
    fn title_from_title_tag() {
        let out = transform("<html><head><title> My Page </title></head><body></body></html>", BASE, 0);
        assert_eq!(out.title, "My Page");
    }

    #[test]
    fn title_falls_back_to_heading_then_default() {
        let out = transform("<html><body><h2>First Heading</h2></body></html>", BASE, 0);
        assert_eq!(out.title, "First Heading");

        let out = transform("<html><body><p>plain</p></body></html>", BASE, 0);
        assert_eq!(out.title, DEFAULT_TITLE);
    }

    #[test]
    fn noise_elements_removed_content_kept() {
        let raw = r#"<html><body>
            <nav>menu</nav>
            <script>var x = 1;</script>
            <div class="advertisement">buy now</div>
            <div class="ad-banner">more ads</div>
            <p>the real content</p>
        </body></html>"#;
        let out = transform(raw, BASE, 0);
        assert!(out.markup.contains("the real content"));
        assert!(!out.markup.contains("var x"));
        assert!(!out.markup.contains("menu"));
        assert!(!out.markup.contains("buy now"));
        assert!(!out.markup.contains("more ads"));
    }

    #[test]
    fn important_container_survives_ad_class() {
        let raw = r#"<html><body><main class="ads"><p>kept</p></main></body></html>"#;
        let out = transform(raw, BASE, 0);
        assert!(out.markup.contains("kept"));
    }

    #[test]
    fn style_attrs_stripped_except_background_image() {
        let raw = r#"<html><body>
            <p style="color:red">styled</p>
            <div style="background-image: url('/bg.png')">hero</div>
        </body></html>"#;
        let out = transform(raw, BASE, 0);
        assert!(!out.markup.contains("color:red"));
        assert!(out.markup.contains("background-image"));
    }

    #[test]
    fn annotation_relocated_with_round_trip_anchors() {
        let raw = r#"<html><body>
            <p>before</p>
            <div class="warning">mind the gap</div>
            <p>after</p>
        </body></html>"#;
        let out = transform(raw, BASE, 3);

        assert_eq!(out.annotations.len(), 1);
        let a = &out.annotations[0];
        assert_eq!(a.seq, 1);
        assert_eq!(a.category, NoteCategory::Warning);
        assert_eq!(a.content, "mind the gap");
        assert_eq!(a.id, "wb-note-3-1");
        assert_eq!(a.back_ref_id, "wb-note-ref-3-1");

        // exactly one in-text anchor pointing at the annotation id
        assert_eq!(out.markup.matches(&format!("href=\"#{}\"", a.id)).count(), 1);
        assert_eq!(out.markup.matches(&format!("id=\"{}\"", a.back_ref_id)).count(), 1);
        // exactly one end-of-document container pointing back
        assert_eq!(out.markup.matches(&format!("id=\"{}\"", a.id)).count(), 1);
        assert_eq!(
            out.markup.matches(&format!("href=\"#{}\"", a.back_ref_id)).count(),
            1
        );
        // the original element body moved out of line
        assert!(out.markup.contains("[1]"));
        assert!(out.markup.contains("page-notes"));
    }

    #[test]
    fn footnote_container_kept_entries_relocated_sharing_counter() {
        let raw = r#"<html><body>
            <div class="note">a note</div>
            <ol class="footnotes">
                <li class="footnote">first footnote</li>
                <li class="footnote">second footnote</li>
            </ol>
        </body></html>"#;
        let out = transform(raw, BASE, 0);

        // note is seq 1, footnote entries continue as 2 and 3
        let seqs: Vec<usize> = out.annotations.iter().map(|a| a.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        // container stayed, got a heading
        assert!(out.markup.contains("footnotes-heading"));
        assert!(out.markup.contains("<ol class=\"footnotes\">"));
        // entries replaced in place
        assert!(!out.markup.contains("<li class=\"footnote\">first footnote</li>"));
        assert!(out.markup.contains("[2]"));
        assert!(out.markup.contains("[3]"));
    }

    #[test]
    fn no_annotations_no_block() {
        let out = transform("<html><body><p>hi</p></body></html>", BASE, 0);
        assert!(!out.markup.contains("page-notes"));
    }

    #[test]
    fn blockquote_decorated_with_marker_and_source() {
        let raw = r#"<html><body>
            <blockquote class="pull">To be or not to be <cite>Hamlet</cite></blockquote>
        </body></html>"#;
        let out = transform(raw, BASE, 0);
        assert!(out.markup.contains("[quote]"));
        assert!(out.markup.contains("Source: Hamlet"));
        // original attributes preserved
        assert!(out.markup.contains("<blockquote class=\"pull\">"));
    }

    #[test]
    fn blockquote_without_cite_gets_no_source_line() {
        let raw = "<html><body><blockquote>quoted</blockquote></body></html>";
        let out = transform(raw, BASE, 0);
        assert!(out.markup.contains("[quote]"));
        assert!(!out.markup.contains("quote-source"));
    }

    #[test]
    fn image_enumeration_covers_all_kinds() {
        let raw = r#"<html><body>
            <img src="/img/pic.png" alt="a pic">
            <img data-src="lazy.jpg" alt="lazy">
            <img src="//cdn.example/c.gif" alt="proto">
            <img src="data:image/png;base64,AAAA" alt="inline">
            <div style="background-image: url('bg/hero.webp')">hero</div>
            <picture>
                <source srcset="small.jpg 1x, big.jpg 2x">
                <img src="fallback.png" alt="pictured">
            </picture>
        </body></html>"#;
        let out = transform(raw, BASE, 0);
        let resolved: Vec<&str> = out.images.iter().map(|r| r.resolved_url.as_str()).collect();

        assert!(resolved.contains(&"https://site.example/img/pic.png"));
        assert!(resolved.contains(&"https://site.example/a/lazy.jpg"));
        assert!(resolved.contains(&"https://cdn.example/c.gif"));
        assert!(resolved.contains(&"https://site.example/a/bg/hero.webp"));
        assert!(resolved.contains(&"https://site.example/a/small.jpg"));
        assert!(resolved.contains(&"https://site.example/a/fallback.png"));
        // the data: URI is excluded
        assert!(!out.images.iter().any(|r| r.original_src.starts_with("data:")));

        // original attribute values kept verbatim for later substitution
        let pic = out.images.iter().find(|r| r.alt == "a pic").unwrap();
        assert_eq!(pic.original_src, "/img/pic.png");

        // srcset alt comes from the sibling img
        let small = out
            .images
            .iter()
            .find(|r| r.resolved_url.ends_with("small.jpg"))
            .unwrap();
        assert_eq!(small.alt, "pictured");
    }

    #[test]
    fn duplicate_resolved_urls_deduplicated() {
        let raw = r#"<html><body>
            <img src="/same.png" alt="one">
            <img src="/same.png" alt="two">
        </body></html>"#;
        let out = transform(raw, BASE, 0);
        assert_eq!(out.images.len(), 1);
    }

    #[test]
    fn resolve_src_cases() {
        let base = Url::parse(BASE).unwrap();
        assert_eq!(
            resolve_src(&base, "/img/pic.png").unwrap(),
            "https://site.example/img/pic.png"
        );
        assert_eq!(
            resolve_src(&base, "//cdn.example/x.png").unwrap(),
            "https://cdn.example/x.png"
        );
        assert_eq!(
            resolve_src(&base, "rel.png").unwrap(),
            "https://site.example/a/rel.png"
        );
        assert_eq!(
            resolve_src(&base, "http://other.example/y.png").unwrap(),
            "http://other.example/y.png"
        );
    }

    #[test]
    fn unparseable_markup_degrades_instead_of_failing() {
        let out = transform("<<<<not html at all", BASE, 0);
        assert_eq!(out.title, DEFAULT_TITLE);
        assert!(out.images.is_empty());
    }
}
