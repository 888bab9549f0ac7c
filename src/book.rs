//! Document assembly: the builder seam and the default HTML bundle.
//!
//! The pipeline's obligation ends at handing over an ordered,
//! fully-substituted chapter list — every image already inlined as a
//! data URI, nothing left for the builder to resolve. The
//! [`DocumentBuilder`] trait keeps the container format pluggable;
//! [`HtmlBundleBuilder`] is the built-in implementation and emits one
//! self-contained XHTML file with a table of contents.

use crate::error::WebbookError;
use crate::output::{BookMetadata, Chapter};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Packages an ordered chapter list plus metadata into one output file.
#[async_trait]
pub trait DocumentBuilder: Send + Sync {
    async fn build(
        &self,
        metadata: &BookMetadata,
        chapters: &[Chapter],
        output: &Path,
    ) -> Result<(), WebbookError>;
}

/// Default builder: a single self-contained XHTML document.
#[derive(Debug, Default)]
pub struct HtmlBundleBuilder;

#[async_trait]
impl DocumentBuilder for HtmlBundleBuilder {
    async fn build(
        &self,
        metadata: &BookMetadata,
        chapters: &[Chapter],
        output: &Path,
    ) -> Result<(), WebbookError> {
        let document = render_bundle(metadata, chapters);

        // Atomic write: temp file in the target directory, then rename,
        // so a crash never leaves a half-written artifact.
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    WebbookError::OutputWriteFailed {
                        path: output.to_path_buf(),
                        source: e,
                    }
                })?;
            }
        }

        let tmp_path = output.with_extension("html.tmp");
        tokio::fs::write(&tmp_path, &document)
            .await
            .map_err(|e| WebbookError::OutputWriteFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
        tokio::fs::rename(&tmp_path, output)
            .await
            .map_err(|e| WebbookError::OutputWriteFailed {
                path: output.to_path_buf(),
                source: e,
            })?;

        info!(
            "wrote {} chapters ({} bytes) to {}",
            chapters.len(),
            document.len(),
            output.display()
        );
        Ok(())
    }
}

/// Render the bundle: head, table of contents, one section per chapter.
fn render_bundle(metadata: &BookMetadata, chapters: &[Chapter]) -> String {
    let mut doc = String::with_capacity(chapters.iter().map(|c| c.content.len()).sum::<usize>() + 4096);

    doc.push_str("<!DOCTYPE html>\n");
    doc.push_str(&format!("<html lang=\"{}\">\n<head>\n", metadata.language));
    doc.push_str("<meta charset=\"utf-8\"/>\n");
    doc.push_str(&format!("<title>{}</title>\n", escape(&metadata.title)));
    doc.push_str(&format!(
        "<meta name=\"author\" content=\"{}\"/>\n",
        escape(&metadata.author)
    ));
    doc.push_str("</head>\n<body>\n");

    doc.push_str(&format!("<h1>{}</h1>\n", escape(&metadata.title)));
    doc.push_str("<nav class=\"toc\"><h2>Contents</h2><ol>\n");
    for (i, chapter) in chapters.iter().enumerate() {
        doc.push_str(&format!(
            "<li><a href=\"#chapter-{i}\">{}</a></li>\n",
            escape(&chapter.title)
        ));
    }
    doc.push_str("</ol></nav>\n");

    for (i, chapter) in chapters.iter().enumerate() {
        doc.push_str(&format!("<section class=\"chapter\" id=\"chapter-{i}\">\n"));
        doc.push_str(&format!("<h2>{}</h2>\n", escape(&chapter.title)));
        doc.push_str(&format!(
            "<p class=\"chapter-source\"><a href=\"{0}\">{0}</a></p>\n",
            chapter.source_url
        ));
        doc.push_str(&chapter.content);
        doc.push_str("\n</section>\n");
    }

    doc.push_str("</body>\n</html>\n");
    doc
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(title: &str, content: &str, url: &str) -> Chapter {
        Chapter {
            title: title.to_string(),
            content: content.to_string(),
            source_url: url.to_string(),
        }
    }

    #[test]
    fn bundle_contains_toc_and_chapters_in_order() {
        let meta = BookMetadata::default();
        let chapters = vec![
            chapter("First", "<p>one</p>", "https://a"),
            chapter("Second", "<p>two</p>", "https://b"),
        ];
        let doc = render_bundle(&meta, &chapters);

        assert!(doc.contains("<title>Web Articles Collection</title>"));
        assert!(doc.contains("href=\"#chapter-0\""));
        assert!(doc.contains("href=\"#chapter-1\""));
        let first = doc.find("<p>one</p>").unwrap();
        let second = doc.find("<p>two</p>").unwrap();
        assert!(first < second);
    }

    #[test]
    fn titles_are_escaped() {
        let meta = BookMetadata {
            title: "Tom & Jerry <3".into(),
            ..Default::default()
        };
        let doc = render_bundle(&meta, &[]);
        assert!(doc.contains("Tom &amp; Jerry &lt;3"));
    }

    #[tokio::test]
    async fn build_writes_atomic_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("book.html");
        let meta = BookMetadata::default();
        let chapters = vec![chapter("Only", "<p>body</p>", "https://a")];

        HtmlBundleBuilder
            .build(&meta, &chapters, &out)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("<p>body</p>"));
        assert!(!dir.path().join("book.html.tmp").exists());
    }
}
