//! Filesystem storage backend
//!
//! Everything lives under one base directory as plain files: page content,
//! JSON metadata sidecars, run summaries, crawl state and batch manifests.

use crate::output::{BatchManifest, RunSummary};
use crate::state::CrawlState;
use crate::storage::layout::{self, LOGS_DIR, MANIFEST_FILE, METADATA_DIR, SNAPSHOTS_DIR};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::url::ArchivedPageRef;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Plain-file storage rooted at a base directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    base: PathBuf,
}

impl FileStorage {
    /// Opens storage at `base`, creating `snapshots/`, `metadata/` and `logs/`
    pub fn new(base: impl Into<PathBuf>) -> StorageResult<Self> {
        let base = base.into();

        for dir in [SNAPSHOTS_DIR, METADATA_DIR, LOGS_DIR] {
            fs::create_dir_all(base.join(dir))?;
        }

        tracing::debug!("Opened archive storage at {}", base.display());
        Ok(Self { base })
    }

    fn domain_of(page: &ArchivedPageRef) -> StorageResult<String> {
        page.domain()
            .map(|d| layout::sanitize_domain(&d))
            .ok_or_else(|| StorageError::InvalidArchiveUrl(page.archive_url().to_string()))
    }

    /// `snapshots/<sanitized-domain>/<timestamp>/`
    fn snapshot_dir(&self, page: &ArchivedPageRef) -> StorageResult<PathBuf> {
        let domain = Self::domain_of(page)?;
        Ok(self
            .base
            .join(SNAPSHOTS_DIR)
            .join(domain)
            .join(page.timestamp()))
    }

    /// `snapshots/<domain>/<date>/`, keys taken verbatim
    fn batch_dir(&self, domain: &str, date: &str) -> StorageResult<PathBuf> {
        for key in [domain, date] {
            if !layout::is_safe_segment(key) || key.contains("..") {
                return Err(StorageError::InvalidBatchKey(key.to_string()));
            }
        }
        Ok(self.base.join(SNAPSHOTS_DIR).join(domain).join(date))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.base)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn sidecar_path(content_path: &Path) -> PathBuf {
        let name = content_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        content_path.with_file_name(layout::meta_filename(&name))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn write_content(path: &Path, content: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

impl Storage for FileStorage {
    fn page_path(&self, page: &ArchivedPageRef) -> StorageResult<PathBuf> {
        let dir = self.snapshot_dir(page)?;
        Ok(dir.join(layout::page_filename(page.original_url())))
    }

    fn save_page(
        &self,
        page: &ArchivedPageRef,
        content: &str,
        mut metadata: Map<String, Value>,
    ) -> StorageResult<PathBuf> {
        let path = self.page_path(page)?;
        let domain = page.domain().unwrap_or_default();

        write_content(&path, content)?;

        metadata.insert("archive_url".into(), page.archive_url().into());
        metadata.insert("original_url".into(), page.original_url().into());
        metadata.insert("timestamp".into(), page.timestamp().into());
        metadata.insert("domain".into(), domain.into());
        metadata.insert("saved_at".into(), Utc::now().to_rfc3339().into());
        metadata.insert("content_length".into(), content.len().into());
        metadata.insert("file_path".into(), self.relative(&path).into());

        write_json(&Self::sidecar_path(&path), &metadata)?;

        tracing::debug!("Saved {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }

    fn page_exists(&self, page: &ArchivedPageRef) -> bool {
        self.page_path(page).map(|p| p.is_file()).unwrap_or(false)
    }

    fn save_summary(&self, start: &ArchivedPageRef, summary: &RunSummary) -> StorageResult<PathBuf> {
        let domain = Self::domain_of(start)?;
        let path = self
            .base
            .join(METADATA_DIR)
            .join(domain)
            .join(layout::summary_filename(start.timestamp()));

        write_json(&path, summary)?;
        tracing::info!("Saved run summary to {}", path.display());
        Ok(path)
    }

    fn load_state(&self, start: &ArchivedPageRef) -> StorageResult<Option<CrawlState>> {
        let path = self.snapshot_dir(start)?.join(layout::STATE_FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let state = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    fn save_state(&self, start: &ArchivedPageRef, state: &CrawlState) -> StorageResult<PathBuf> {
        let path = self.snapshot_dir(start)?.join(layout::STATE_FILE);
        write_json(&path, state)?;
        Ok(path)
    }

    fn batch_page_path(
        &self,
        domain: &str,
        date: &str,
        original_url: &str,
    ) -> StorageResult<PathBuf> {
        let dir = self.batch_dir(domain, date)?;
        let name = format!("{}{}", layout::batch_filename(original_url), layout::PAGE_EXTENSION);
        Ok(dir.join(name))
    }

    fn batch_page_exists(&self, domain: &str, date: &str, original_url: &str) -> bool {
        self.batch_page_path(domain, date, original_url)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn save_batch_page(
        &self,
        domain: &str,
        date: &str,
        original_url: &str,
        content: &str,
        metadata: &Value,
    ) -> StorageResult<PathBuf> {
        let path = self.batch_page_path(domain, date, original_url)?;
        write_content(&path, content)?;
        write_json(&Self::sidecar_path(&path), metadata)?;
        Ok(path)
    }

    fn save_manifest(
        &self,
        domain: &str,
        date: &str,
        manifest: &BatchManifest,
    ) -> StorageResult<PathBuf> {
        let path = self.batch_dir(domain, date)?.join(MANIFEST_FILE);
        write_json(&path, manifest)?;
        Ok(path)
    }
}
