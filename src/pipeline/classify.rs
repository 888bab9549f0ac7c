//! Pure classification heuristics over (tag name, class tokens, attributes).
//!
//! Noise detection and annotation categorisation are inherently
//! approximate, so they live here as standalone functions with no access
//! to the DOM or the transformation state. Tuning a heuristic never
//! touches orchestration logic, and every rule is testable with plain
//! string inputs.

use std::fmt;

/// Tags removed outright during the noise pass.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "iframe", "noscript", "form",
];

/// Class/id substrings that mark advertisement-like regions.
const AD_MARKERS: &[&str] = &[
    "advertisement",
    "adsbygoogle",
    "sponsor",
    "banner",
    "promo",
    "sidebar",
    "menu",
];

/// Tags that must never be removed, whatever their classes look like.
const IMPORTANT_TAGS: &[&str] = &["main", "article", "blockquote", "body", "html", "figure"];

/// Class tokens marking structurally important containers. The
/// allowlist takes precedence over the ad-like denylist: a
/// `<div class="post-body ad-free">` stays.
const IMPORTANT_CLASSES: &[&str] = &["content", "main", "article", "post", "entry", "story"];

/// Category of a relocated annotation, inferred from class keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NoteCategory {
    Warning,
    Info,
    Tip,
    Generic,
}

impl NoteCategory {
    /// CSS class used for the end-of-document container.
    pub fn css_class(self) -> &'static str {
        match self {
            NoteCategory::Warning => "note-warning",
            NoteCategory::Info => "note-info",
            NoteCategory::Tip => "note-tip",
            NoteCategory::Generic => "note-generic",
        }
    }

    /// Border colour for the category-coloured container.
    pub fn color(self) -> &'static str {
        match self {
            NoteCategory::Warning => "#c0392b",
            NoteCategory::Info => "#2980b9",
            NoteCategory::Tip => "#27ae60",
            NoteCategory::Generic => "#7f8c8d",
        }
    }
}

impl fmt::Display for NoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoteCategory::Warning => "Warning",
            NoteCategory::Info => "Info",
            NoteCategory::Tip => "Tip",
            NoteCategory::Generic => "Note",
        };
        f.write_str(label)
    }
}

/// Kind of footnote-like match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootnoteKind {
    /// A collection wrapping many footnotes; annotated with a heading
    /// and left in place.
    Container,
    /// A single footnote/citation entry; replaced with an anchor link.
    Entry,
}

fn tokens(class_attr: &str) -> impl Iterator<Item = &str> {
    class_attr.split_whitespace()
}

fn token_is_ad_like(token: &str) -> bool {
    let t = token.to_ascii_lowercase();
    t == "ad"
        || t == "ads"
        || t.starts_with("ad-")
        || t.ends_with("-ad")
        || AD_MARKERS.iter().any(|m| t.contains(m))
}

/// True when the element is a structurally important container that the
/// noise pass must preserve even if it also matches an ad-like token.
pub fn is_important(tag: &str, class_attr: &str) -> bool {
    if IMPORTANT_TAGS.contains(&tag) {
        return true;
    }
    tokens(class_attr).any(|t| {
        let t = t.to_ascii_lowercase();
        IMPORTANT_CLASSES.iter().any(|c| t.contains(c))
    })
}

/// True when the element is structural noise: script/style blocks,
/// navigation chrome, or an advertisement-marked region.
pub fn is_noise(tag: &str, class_attr: &str, id_attr: &str) -> bool {
    if NOISE_TAGS.contains(&tag) {
        return true;
    }
    if is_important(tag, class_attr) {
        return false;
    }
    tokens(class_attr).any(token_is_ad_like)
        || tokens(id_attr).any(token_is_ad_like)
}

/// Classify an element as an annotation (note/tip/warning/callout),
/// returning its category, or `None` when it is ordinary content.
pub fn annotation_category(tag: &str, class_attr: &str, role_attr: &str) -> Option<NoteCategory> {
    // Headings, media, and links are never annotations even when a
    // theme slaps "note" classes on them.
    if matches!(tag, "a" | "img" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
        return None;
    }

    let lower: Vec<String> = tokens(class_attr)
        .map(|t| t.to_ascii_lowercase())
        .collect();

    let has = |needle: &str| lower.iter().any(|t| t.contains(needle));

    if has("warning") || has("caution") || has("danger") || has("alert") {
        return Some(NoteCategory::Warning);
    }
    if has("tip") || has("hint") {
        return Some(NoteCategory::Tip);
    }
    if has("info") || has("notice") {
        return Some(NoteCategory::Info);
    }
    if has("note") || has("callout") || has("admonition") || role_attr.eq_ignore_ascii_case("note") {
        return Some(NoteCategory::Generic);
    }
    None
}

/// Classify footnote/reference/citation-like elements.
///
/// A plural class token ("footnotes", "references") or a list element
/// with a footnote-ish class marks a container; `li`/`p`/`span`/`sup`
/// elements with singular tokens are individual entries.
pub fn footnote_kind(tag: &str, class_attr: &str, id_attr: &str) -> Option<FootnoteKind> {
    let lower: Vec<String> = tokens(class_attr)
        .chain(tokens(id_attr))
        .map(|t| t.to_ascii_lowercase())
        .collect();

    let container_marker = lower.iter().any(|t| {
        t.contains("footnotes") || t.contains("references") || t.contains("endnotes") || t.contains("citations")
    });
    let entry_marker = lower.iter().any(|t| {
        t.contains("footnote") || t.contains("reference") || t.contains("endnote") || t.contains("citation")
    });

    if container_marker || (entry_marker && matches!(tag, "ol" | "ul" | "section" | "div")) {
        return Some(FootnoteKind::Container);
    }
    if entry_marker && matches!(tag, "li" | "p" | "span" | "sup" | "aside") {
        return Some(FootnoteKind::Entry);
    }
    None
}
