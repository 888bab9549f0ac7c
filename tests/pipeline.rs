//! End-to-end pipeline tests over a scripted transport.
//!
//! No network, no curl: a `MapTransport` serves canned bodies per URL
//! and records the order of every fetch, which is enough to verify
//! ordering, batching, failure isolation, and image caching from the
//! public API alone.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webbook::{
    build, build_to_file, FetchError, FetchStrategy, PipelineConfig, Transport, WebbookError,
};

/// Serves canned bytes per URL and logs every fetch in arrival order.
struct MapTransport {
    responses: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MapTransport {
    fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            responses: entries
                .iter()
                .map(|(u, b)| (u.to_string(), b.as_bytes().to_vec()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Transport for MapTransport {
    async fn fetch(
        &self,
        url: &str,
        _strategy: &FetchStrategy,
        _scratch: &Path,
    ) -> Result<Vec<u8>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Transport("404".into()))
    }
}

fn one_shot() -> Vec<FetchStrategy> {
    vec![FetchStrategy {
        label: "test",
        timeout: Duration::from_secs(1),
        retries: 1,
        accept_invalid_certs: false,
        disable_proxy: false,
        downgrade_to_http: false,
        via_curl: false,
    }]
}

fn test_config(transport: Arc<MapTransport>) -> PipelineConfig {
    PipelineConfig::builder()
        .page_strategies(one_shot())
        .image_strategies(one_shot())
        .inter_batch_delay_ms(0)
        .transport(transport)
        .build()
        .unwrap()
}

fn page(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
}

#[tokio::test]
async fn chapters_match_input_length_and_order() {
    let transport = MapTransport::new(&[
        ("https://s.example/a", &page("Alpha", "<p>a</p>")),
        ("https://s.example/b", &page("Beta", "<p>b</p>")),
        ("https://s.example/c", &page("Gamma", "<p>c</p>")),
    ]);
    let config = test_config(Arc::clone(&transport));
    let urls: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|p| format!("https://s.example/{p}"))
        .collect();

    let out = build(&urls, &config).await.unwrap();

    assert_eq!(out.chapters.len(), 3);
    assert_eq!(out.chapters[0].title, "Alpha");
    assert_eq!(out.chapters[1].title, "Beta");
    assert_eq!(out.chapters[2].title, "Gamma");
    assert_eq!(out.stats.requested_pages, 3);
    assert_eq!(out.stats.succeeded_pages, 3);
    assert_eq!(out.stats.failed_pages, 0);
}

#[tokio::test]
async fn failed_page_becomes_error_chapter_in_place() {
    let transport = MapTransport::new(&[
        ("https://s.example/a", &page("Alpha", "<p>a</p>")),
        // /b intentionally absent
        ("https://s.example/c", &page("Gamma", "<p>c</p>")),
    ]);
    let config = test_config(transport);
    let urls: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|p| format!("https://s.example/{p}"))
        .collect();

    let out = build(&urls, &config).await.unwrap();

    assert_eq!(out.chapters.len(), 3);
    assert_eq!(out.chapters[0].title, "Alpha");
    assert_eq!(out.chapters[1].title, "Error: https://s.example/b");
    assert!(out.chapters[1].content.contains("Failed to load content"));
    assert!(out.chapters[1]
        .content
        .contains("href=\"https://s.example/b\""));
    assert_eq!(out.chapters[2].title, "Gamma");
    assert_eq!(out.stats.succeeded_pages, 2);
    assert_eq!(out.stats.failed_pages, 1);
}

#[tokio::test]
async fn batches_settle_before_the_next_group_starts() {
    let urls: Vec<String> = (0..7).map(|i| format!("https://s.example/{i}")).collect();
    let entries: Vec<(String, String)> = urls
        .iter()
        .enumerate()
        .map(|(i, u)| (u.clone(), page(&format!("P{i}"), "<p>x</p>")))
        .collect();
    let entry_refs: Vec<(&str, &str)> = entries
        .iter()
        .map(|(u, b)| (u.as_str(), b.as_str()))
        .collect();
    let transport = MapTransport::new(&entry_refs);

    let config = PipelineConfig::builder()
        .page_strategies(one_shot())
        .image_strategies(one_shot())
        .batch_size(3)
        .max_concurrent_pages(3)
        .inter_batch_delay_ms(0)
        .transport(transport.clone())
        .build()
        .unwrap();

    let out = build(&urls, &config).await.unwrap();
    assert_eq!(out.chapters.len(), 7);

    // One fetch per page; within a group order is arbitrary, but every
    // fetch of group N must precede every fetch of group N+1.
    let calls = transport.calls();
    assert_eq!(calls.len(), 7);
    let position = |url: &str| calls.iter().position(|c| c == url).unwrap();
    let group_max =
        |range: std::ops::Range<usize>| range.map(|i| position(&urls[i])).max().unwrap();
    let group_min =
        |range: std::ops::Range<usize>| range.map(|i| position(&urls[i])).min().unwrap();

    assert!(group_max(0..3) < group_min(3..6));
    assert!(group_max(3..6) < group_min(6..7));
}

#[tokio::test]
async fn shared_image_is_downloaded_once_across_pages() {
    let html_a = page("A", r#"<p>a</p><img src="/logo.png" alt="logo">"#);
    let html_b = page("B", r#"<p>b</p><img src="/logo.png" alt="logo">"#);
    let transport = MapTransport::new(&[
        ("https://s.example/a", &html_a),
        ("https://s.example/b", &html_b),
        ("https://s.example/logo.png", "PNGBYTES"),
    ]);

    // batch_size 1 serialises the pages, so the second page observes the
    // first page's cache entry deterministically.
    let config = PipelineConfig::builder()
        .page_strategies(one_shot())
        .image_strategies(one_shot())
        .batch_size(1)
        .inter_batch_delay_ms(0)
        .transport(transport.clone())
        .build()
        .unwrap();

    let urls = vec![
        "https://s.example/a".to_string(),
        "https://s.example/b".to_string(),
    ];
    let out = build(&urls, &config).await.unwrap();

    assert_eq!(transport.call_count("https://s.example/logo.png"), 1);
    assert_eq!(out.stats.images_downloaded, 1);
    assert!(out.stats.image_cache_hits >= 1);
    for chapter in &out.chapters {
        assert!(chapter.content.contains("data:image/png;base64,"));
        assert!(!chapter.content.contains("src=\"/logo.png\""));
    }
}

#[tokio::test]
async fn unreachable_images_degrade_to_placeholders() {
    let html = page("A", r#"<p>a</p><img src="/gone.png" alt="missing art">"#);
    let transport = MapTransport::new(&[("https://s.example/a", &html)]);
    let config = test_config(transport);

    let out = build(&["https://s.example/a".to_string()], &config)
        .await
        .unwrap();

    let content = &out.chapters[0].content;
    assert!(!content.contains("<img"));
    assert!(content.contains("[missing art]"));
    assert_eq!(out.stats.images_downloaded, 0);
}

#[tokio::test]
async fn empty_address_list_is_rejected() {
    let transport = MapTransport::new(&[]);
    let config = test_config(transport);
    let err = build(&[], &config).await.unwrap_err();
    assert!(matches!(err, WebbookError::NoAddresses));
}

#[tokio::test]
async fn build_to_file_bundles_all_chapters() {
    let transport = MapTransport::new(&[
        ("https://s.example/a", &page("Alpha", "<p>first body</p>")),
        ("https://s.example/b", &page("Beta", "<p>second body</p>")),
    ]);
    let config = PipelineConfig::builder()
        .page_strategies(one_shot())
        .image_strategies(one_shot())
        .inter_batch_delay_ms(0)
        .title("Bundle Test")
        .transport(transport)
        .build()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("book.html");
    let urls = vec![
        "https://s.example/a".to_string(),
        "https://s.example/b".to_string(),
    ];

    let out = build_to_file(&urls, &out_path, &config).await.unwrap();
    assert_eq!(out.chapters.len(), 2);

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert!(written.contains("<title>Bundle Test</title>"));
    assert!(written.contains("first body"));
    assert!(written.contains("second body"));
    let alpha = written.find("first body").unwrap();
    let beta = written.find("second body").unwrap();
    assert!(alpha < beta);
}

#[tokio::test]
async fn annotations_are_relocated_to_chapter_end() {
    let html = page(
        "Notes",
        r#"<p id="lead">lead paragraph</p>
           <div class="note">a stray note</div>
           <p id="tail">tail paragraph</p>"#,
    );
    let transport = MapTransport::new(&[("https://s.example/a", &html)]);
    let config = test_config(transport);

    let out = build(&["https://s.example/a".to_string()], &config)
        .await
        .unwrap();

    let content = &out.chapters[0].content;
    let note = content.find("a stray note").unwrap();
    let tail = content.find("tail paragraph").unwrap();
    assert!(note > tail, "note should trail the body text");
    assert!(content.contains("note-ref"));
}
