//! Integration tests for the batch downloader
//!
//! A wiremock server stands in for the archive; capture lists point at it.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wayback_archiver::config::Config;
use wayback_archiver::crawler::{load_records, BatchDownloader, RateLimiter, SnapshotRecord};
use wayback_archiver::storage::{FileStorage, Storage, StorageError};
use wayback_archiver::ArchiveError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOMAIN: &str = "x.com";
const DATE: &str = "20190721";
const TS: &str = "20190721000000";

fn downloader(storage: Arc<FileStorage>, resume: bool) -> BatchDownloader {
    let mut config = Config::default();
    config.downloader.max_concurrent = 2;
    config.downloader.resume = resume;
    config.crawler.request_timeout_secs = 5;

    BatchDownloader::new(&config, storage)
        .expect("Failed to create downloader")
        .with_limiter(RateLimiter::with_delay(Duration::from_millis(1), 1000))
}

fn record(server: &MockServer, page: &str) -> SnapshotRecord {
    let original = format!("https://x.com/{}", page);
    let archive_url = format!("{}/web/{}/{}", server.uri(), TS, original);
    SnapshotRecord::new(&archive_url, &original, TS)
}

async fn mount(server: &MockServer, page: &str, status: u16, expected_calls: u64) {
    let body = format!("<html><head><title>{}</title></head><body></body></html>", page);
    Mock::given(method("GET"))
        .and(path(format!("/web/{}/https://x.com/{}", TS, page)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn read_json(path: std::path::PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_download_retries_failures_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    for page in ["a", "b", "c"] {
        mount(&server, page, 200, 1).await;
    }
    // One attempt in the main pass, one in the retry pass, no more
    for page in ["d", "e"] {
        mount(&server, page, 500, 2).await;
    }

    let records: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|p| record(&server, p))
        .collect();

    let summary = downloader(storage.clone(), true)
        .download(DOMAIN, DATE, records)
        .await
        .unwrap();

    assert_eq!(summary.total_attempted, 5);
    assert_eq!(summary.successful, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.skipped, 0);

    assert!(storage.batch_page_exists(DOMAIN, DATE, "https://x.com/a"));
    assert!(!storage.batch_page_exists(DOMAIN, DATE, "https://x.com/d"));

    let manifest = read_json(dir.path().join("snapshots/x.com/20190721/snapshot_manifest.json"));
    assert_eq!(manifest["domain"], DOMAIN);
    assert_eq!(manifest["target_date"], DATE);
    assert_eq!(manifest["total_snapshots"], 5);
    assert_eq!(manifest["successful_downloads"], 3);
    assert_eq!(manifest["failed_downloads"], 2);
    assert_eq!(manifest["snapshots_metadata"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_retry_pass_recovers_transient_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    // First request fails, the retry is served by the fallback below
    Mock::given(method("GET"))
        .and(path(format!("/web/{}/https://x.com/flaky", TS)))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount(&server, "flaky", 200, 1).await;

    let summary = downloader(storage.clone(), false)
        .download(DOMAIN, DATE, vec![record(&server, "flaky")])
        .await
        .unwrap();

    assert_eq!(summary.total_attempted, 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);
    assert!(storage.batch_page_exists(DOMAIN, DATE, "https://x.com/flaky"));

    let manifest = read_json(dir.path().join("snapshots/x.com/20190721/snapshot_manifest.json"));
    assert_eq!(manifest["successful_downloads"], 1);
    assert_eq!(manifest["failed_downloads"], 0);
}

#[tokio::test]
async fn test_download_writes_page_metadata() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    mount(&server, "about", 200, 1).await;

    let mut about = record(&server, "about");
    about.extra.insert("statuscode".into(), json!("200"));
    about.extra.insert("days_diff".into(), json!(3));

    downloader(storage.clone(), true)
        .download(DOMAIN, DATE, vec![about])
        .await
        .unwrap();

    let page = storage
        .batch_page_path(DOMAIN, DATE, "https://x.com/about")
        .unwrap();
    let sidecar = read_json(page.with_file_name("x.com_about.html.meta.json"));

    assert_eq!(sidecar["title"], "about");
    assert_eq!(sidecar["original_url"], "https://x.com/about");
    assert_eq!(sidecar["days_diff"], 3);
    assert_eq!(sidecar["size"], 0);
    assert!(sidecar["downloaded_at"].is_string());
}

#[tokio::test]
async fn test_duplicate_originals_downloaded_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    mount(&server, "a", 200, 1).await;

    let records = vec![record(&server, "a"), record(&server, "a")];
    let summary = downloader(storage, false)
        .download(DOMAIN, DATE, records)
        .await
        .unwrap();

    assert_eq!(summary.total_attempted, 1);
    assert_eq!(summary.successful, 1);
}

#[tokio::test]
async fn test_scheme_variants_share_one_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    mount(&server, "a", 200, 1).await;
    Mock::given(method("GET"))
        .and(path(format!("/web/{}/http://x.com/a", TS)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let plain = format!("{}/web/{}/http://x.com/a", server.uri(), TS);
    let records = vec![
        record(&server, "a"),
        SnapshotRecord::new(&plain, "http://x.com/a", TS),
    ];
    let summary = downloader(storage, false)
        .download(DOMAIN, DATE, records)
        .await
        .unwrap();

    assert_eq!(summary.total_attempted, 1);
    assert_eq!(summary.successful, 1);

    let pages: Vec<_> = std::fs::read_dir(dir.path().join("snapshots/x.com/20190721"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".html"))
        .collect();
    assert_eq!(pages.len(), 1);
}

#[tokio::test]
async fn test_resume_skips_saved_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    storage
        .save_batch_page(DOMAIN, DATE, "https://x.com/a", "<html></html>", &json!({}))
        .unwrap();
    mount(&server, "a", 200, 0).await;
    mount(&server, "b", 200, 1).await;

    let records = vec![record(&server, "a"), record(&server, "b")];
    let summary = downloader(storage, true)
        .download(DOMAIN, DATE, records)
        .await
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.total_attempted, 1);
    assert_eq!(summary.successful, 1);
}

#[tokio::test]
async fn test_nothing_left_still_writes_manifest() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    storage
        .save_batch_page(DOMAIN, DATE, "https://x.com/a", "<html></html>", &json!({}))
        .unwrap();

    let summary = downloader(storage, true)
        .download(DOMAIN, DATE, vec![record(&server, "a")])
        .await
        .unwrap();

    assert_eq!(summary.total_attempted, 0);
    assert_eq!(summary.skipped, 1);
    assert!(server.received_requests().await.unwrap().is_empty());

    let manifest = read_json(dir.path().join("snapshots/x.com/20190721/snapshot_manifest.json"));
    assert_eq!(manifest["skipped_existing"], 1);
}

#[tokio::test]
async fn test_unsafe_batch_keys_rejected_before_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());

    let err = downloader(storage, true)
        .download("../x.com", DATE, vec![record(&server, "a")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ArchiveError::Storage(StorageError::InvalidBatchKey(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test]
fn test_load_records_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("captures.json");
    std::fs::write(
        &path,
        r#"[{"archive_url": "https://web.archive.org/web/20190721000000/https://x.com/",
             "original_url": "https://x.com/", "timestamp": "20190721000000", "size": 1024}]"#,
    )
    .unwrap();

    let records = load_records(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].original_url, "https://x.com/");
    assert_eq!(records[0].extra.get("size"), Some(&json!(1024)));

    assert!(load_records(&dir.path().join("missing.json")).is_err());
}
