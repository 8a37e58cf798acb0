//! Integration tests for the snapshot crawler
//!
//! These tests use wiremock as the archive: the archive root and capture
//! index both point at a mock server, so archived pages live at
//! `http://127.0.0.1:PORT/web/<timestamp>/<original-url>`.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wayback_archiver::config::Config;
use wayback_archiver::crawler::{RateLimiter, SiteCrawler};
use wayback_archiver::output::{BatchManifest, RunSummary};
use wayback_archiver::storage::{FileStorage, Storage, StorageError, StorageResult};
use wayback_archiver::{ArchiveError, ArchiveUrls, ArchivedPageRef, CrawlState, FailureKind};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TS: &str = "20190721000000";

fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.archive.root = server.uri();
    config.crawler.max_depth = 3;
    config.crawler.max_pages = 50;
    config.crawler.request_timeout_secs = 5;
    config.paths.priority = Vec::new();
    config.paths.exclude = vec!["/admin".to_string()];
    config.output.base_dir = dir.path().to_path_buf();
    config
}

fn crawler(config: &Config, storage: Arc<dyn Storage>) -> SiteCrawler {
    SiteCrawler::new(config, storage)
        .expect("Failed to create crawler")
        .with_limiter(RateLimiter::with_delay(Duration::from_millis(1), 1000))
}

fn archive_path(original: &str) -> String {
    format!("/web/{}/{}", TS, original)
}

fn html(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, anchors
    )
}

async fn mount_page(server: &MockServer, original: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(archive_path(original)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// File storage whose page writes fail for archive URLs containing `/broken`
struct BrokenDisk {
    inner: FileStorage,
}

impl Storage for BrokenDisk {
    fn page_path(&self, page: &ArchivedPageRef) -> StorageResult<PathBuf> {
        self.inner.page_path(page)
    }

    fn save_page(
        &self,
        page: &ArchivedPageRef,
        content: &str,
        metadata: Map<String, Value>,
    ) -> StorageResult<PathBuf> {
        if page.archive_url().contains("/broken") {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save_page(page, content, metadata)
    }

    fn page_exists(&self, page: &ArchivedPageRef) -> bool {
        self.inner.page_exists(page)
    }

    fn save_summary(
        &self,
        start: &ArchivedPageRef,
        summary: &RunSummary,
    ) -> StorageResult<PathBuf> {
        self.inner.save_summary(start, summary)
    }

    fn load_state(&self, start: &ArchivedPageRef) -> StorageResult<Option<CrawlState>> {
        self.inner.load_state(start)
    }

    fn save_state(&self, start: &ArchivedPageRef, state: &CrawlState) -> StorageResult<PathBuf> {
        self.inner.save_state(start, state)
    }

    fn batch_page_path(
        &self,
        domain: &str,
        date: &str,
        original_url: &str,
    ) -> StorageResult<PathBuf> {
        self.inner.batch_page_path(domain, date, original_url)
    }

    fn batch_page_exists(&self, domain: &str, date: &str, original_url: &str) -> bool {
        self.inner.batch_page_exists(domain, date, original_url)
    }

    fn save_batch_page(
        &self,
        domain: &str,
        date: &str,
        original_url: &str,
        content: &str,
        metadata: &Value,
    ) -> StorageResult<PathBuf> {
        self.inner
            .save_batch_page(domain, date, original_url, content, metadata)
    }

    fn save_manifest(
        &self,
        domain: &str,
        date: &str,
        manifest: &BatchManifest,
    ) -> StorageResult<PathBuf> {
        self.inner.save_manifest(domain, date, manifest)
    }
}

#[tokio::test]
async fn test_crawl_follows_internal_links() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);
    config.paths.priority = vec!["/about".to_string()];

    let rewritten = format!("/web/{}/https://x.com/news/2", TS);
    mount_page(
        &server,
        "https://x.com/",
        html(
            "Home",
            &[
                "/news/1",
                "/about",
                "https://other.com/",
                "/admin/login",
                &rewritten,
            ],
        ),
    )
    .await;
    mount_page(&server, "https://x.com/about", html("About", &[])).await;
    mount_page(&server, "https://x.com/news/1", html("News 1", &["/"])).await;
    mount_page(&server, "https://x.com/news/2", html("News 2", &[])).await;

    Mock::given(method("GET"))
        .and(path(archive_path("https://x.com/admin/login")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let mut crawler = crawler(&config, storage.clone());
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    let titles: Vec<&str> = summary.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "About", "News 1", "News 2"]);
    assert_eq!(summary.total_pages_found, 4);
    assert_eq!(summary.total_pages_failed, 0);
    assert_eq!(summary.target_domain, "x.com");
    assert_eq!(summary.timestamp, TS);
    assert_eq!(summary.max_depth_reached, 1);

    let urls = ArchiveUrls::new(&server.uri()).unwrap();
    for page in &summary.pages {
        let page_ref = urls.page_ref(page.page.archive_url()).unwrap();
        assert!(storage.page_exists(&page_ref));
    }

    let metadata_dir = dir.path().join("metadata/x_com");
    assert!(metadata_dir
        .join(format!("snapshot_{}_summary.json", TS))
        .is_file());
    assert!(dir
        .path()
        .join(format!("snapshots/x_com/{}/crawler_state.json", TS))
        .is_file());
}

#[tokio::test]
async fn test_crawl_respects_max_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);
    config.crawler.max_pages = 2;

    mount_page(
        &server,
        "https://x.com/",
        html("Home", &["/p1", "/p2", "/p3", "/p4", "/p5"]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/web/\d{14}/https://x\.com/p\d$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html("Child", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let mut crawler = crawler(&config, storage);
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    assert_eq!(summary.total_pages_found, 2);
    assert!(summary.pages[1].page.original_url().ends_with("/p1"));
}

#[tokio::test]
async fn test_crawl_respects_max_depth() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);
    config.crawler.max_depth = 1;

    mount_page(&server, "https://x.com/", html("Home", &["/a"])).await;
    mount_page(&server, "https://x.com/a", html("A", &["/b"])).await;

    Mock::given(method("GET"))
        .and(path(archive_path("https://x.com/b")))
        .respond_with(ResponseTemplate::new(200).set_body_string(html("B", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let mut crawler = crawler(&config, storage);
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    assert_eq!(summary.total_pages_found, 2);
    assert_eq!(summary.max_depth_reached, 1);
    assert!(summary.pages.iter().all(|p| p.depth <= 1));
}

#[tokio::test]
async fn test_crawl_records_failures() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    mount_page(&server, "https://x.com/", html("Home", &["/missing", "/broken"])).await;

    Mock::given(method("GET"))
        .and(path(archive_path("https://x.com/broken")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let mut crawler = crawler(&config, storage);
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    assert_eq!(summary.total_pages_found, 1);
    assert_eq!(summary.total_pages_failed, 2);

    let missing = &summary.failed_urls[0];
    assert!(missing.url.ends_with("/missing"));
    assert_eq!(missing.kind, FailureKind::NotFound);
    assert_eq!(missing.depth, 1);

    let broken = &summary.failed_urls[1];
    assert_eq!(broken.kind, FailureKind::HttpStatus);
    assert_eq!(broken.status_code, Some(500));
}

#[tokio::test]
async fn test_excluded_start_page_is_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let mut crawler = crawler(&config, storage);
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/admin"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    assert_eq!(summary.total_pages_found, 0);
    assert_eq!(summary.total_pages_skipped, 1);
    assert_eq!(summary.skipped_urls, vec![start]);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_does_not_refetch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    mount_page(&server, "https://x.com/", html("Home", &["/a"])).await;
    mount_page(&server, "https://x.com/a", html("A", &[])).await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let first = crawler(&config, storage.clone())
        .crawl_snapshot(&start)
        .await
        .unwrap();
    assert_eq!(first.total_pages_found, 2);

    // Saved state marks every page visited
    server.reset().await;
    let second = crawler(&config, storage.clone())
        .crawl_snapshot(&start)
        .await
        .unwrap();
    assert_eq!(second.total_pages_found, 2);
    assert!(server.received_requests().await.unwrap().is_empty());

    // Without state, pages on disk are still not fetched again
    std::fs::remove_file(
        dir.path()
            .join(format!("snapshots/x_com/{}/crawler_state.json", TS)),
    )
    .unwrap();
    let third = crawler(&config, storage)
        .crawl_snapshot(&start)
        .await
        .unwrap();
    assert_eq!(third.total_pages_found, 0);
    assert_eq!(third.pages_already_saved, 1);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fresh_run_ignores_saved_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path(archive_path("https://x.com/")))
        .respond_with(ResponseTemplate::new(200).set_body_string(html("Home", &[])))
        .expect(2)
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    crawler(&config, storage.clone())
        .crawl_snapshot(&start)
        .await
        .unwrap();

    config.crawler.resume = false;
    let summary = crawler(&config, storage)
        .crawl_snapshot(&start)
        .await
        .unwrap();

    assert_eq!(summary.total_pages_found, 1);
    assert_eq!(summary.pages_already_saved, 0);
}

#[tokio::test]
async fn test_crawl_starts_from_nearest_capture() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            ["timestamp", "original", "statuscode"],
            ["20190601000000", "https://x.com/", "200"],
            ["20190720120000", "https://x.com/", "200"],
            ["20190721080000", "https://x.com/", "302"],
            ["20190801000000", "https://x.com/", "200"]
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/web/20190720120000/https://x.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html("Home", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let target = chrono::NaiveDate::from_ymd_opt(2019, 7, 21);

    let summary = crawler(&config, storage)
        .crawl("x.com", target)
        .await
        .unwrap();

    assert_eq!(summary.timestamp, "20190720120000");
    assert_eq!(summary.total_pages_found, 1);
}

#[tokio::test]
async fn test_crawl_without_captures_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path("/cdx/search/cdx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let err = crawler(&config, storage)
        .crawl("x.com", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::SnapshotNotFound { .. }));
}

#[tokio::test]
async fn test_checkpoint_written_during_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);
    config.crawler.checkpoint_interval = 1;

    mount_page(&server, "https://x.com/", html("Home", &["/a"])).await;
    mount_page(&server, "https://x.com/a", html("A", &[])).await;

    let state_file = dir
        .path()
        .join(format!("snapshots/x_com/{}/crawler_state.json", TS));
    let seen = Arc::new(Mutex::new(None));

    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let mut crawler = crawler(&config, storage).with_progress({
        let state_file = state_file.clone();
        let seen = seen.clone();
        move |found, _| {
            // Runs before the second page is fetched
            if found == 1 {
                let saved: CrawlState =
                    serde_json::from_str(&std::fs::read_to_string(&state_file).unwrap()).unwrap();
                *seen.lock().unwrap() = Some(saved.found_pages.len());
            }
        }
    });
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    assert_eq!(summary.total_pages_found, 2);
    assert_eq!(*seen.lock().unwrap(), Some(1));
}

#[tokio::test]
async fn test_page_write_failure_is_recorded() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    mount_page(&server, "https://x.com/", html("Home", &["/broken", "/ok"])).await;
    mount_page(&server, "https://x.com/broken", html("Broken", &[])).await;
    mount_page(&server, "https://x.com/ok", html("Ok", &[])).await;

    let storage = Arc::new(BrokenDisk {
        inner: FileStorage::new(dir.path()).unwrap(),
    });
    let mut crawler = crawler(&config, storage);
    let start = format!("{}{}", server.uri(), archive_path("https://x.com/"));

    let summary = crawler.crawl_snapshot(&start).await.unwrap();

    let titles: Vec<&str> = summary.pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Home", "Ok"]);
    assert_eq!(summary.total_pages_failed, 1);

    let failure = &summary.failed_urls[0];
    assert!(failure.url.ends_with("/broken"));
    assert_eq!(failure.kind, FailureKind::Storage);
    assert!(failure.error.contains("disk full"));
    assert_eq!(failure.depth, 1);

    assert!(dir
        .path()
        .join(format!("metadata/x_com/snapshot_{}_summary.json", TS))
        .is_file());
}
