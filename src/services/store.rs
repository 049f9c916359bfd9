// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! On-disk snapshot hierarchy: `{archive_root}/{domain}/{timestamp}/...`.
//!
//! Lookups of anything that does not exist (unknown domain, bad timestamp,
//! missing page) come back empty rather than as errors. Caller-supplied names
//! are validated so no lookup can leave the archive root.

use crate::models::snapshot::StoredFile;
use crate::services::sanitize::{has_html_extension, INDEX_PAGE};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::warn;
use walkdir::WalkDir;

/// Errors raised by the snapshot store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unsafe path component: {0:?}")]
    UnsafePath(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Snapshot storage rooted at the archive directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

/// Reject names that could escape their parent directory
fn checked_component(component: &str) -> Result<&str, StoreError> {
    let unsafe_name = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains(['/', '\\', '\0']);

    if unsafe_name {
        Err(StoreError::UnsafePath(component.to_string()))
    } else {
        Ok(component)
    }
}

/// Convert a `/`-separated relative path into a checked `PathBuf`
fn checked_relative_path(path: &str) -> Result<PathBuf, StoreError> {
    let mut relative = PathBuf::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        relative.push(checked_component(segment)?);
    }

    if relative.as_os_str().is_empty() {
        return Err(StoreError::UnsafePath(path.to_string()));
    }
    Ok(relative)
}

/// Content type for a raw snapshot file, guessed from its extension
pub fn content_type_for(path: &str) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a snapshot (not required to exist)
    pub fn snapshot_dir(&self, domain: &str, timestamp: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .root
            .join(checked_component(domain)?)
            .join(checked_component(timestamp)?))
    }

    /// Create the directory for a new snapshot
    pub async fn create_snapshot(&self, domain: &str, timestamp: &str) -> Result<PathBuf, StoreError> {
        let dir = self.snapshot_dir(domain, timestamp)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(dir)
    }

    /// Write a page below a snapshot directory, creating parent directories
    pub async fn write_page(
        &self,
        snapshot_dir: &Path,
        page_path: &str,
        html: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = snapshot_dir.join(checked_relative_path(page_path)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        fs::write(&path, html)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(path)
    }

    /// Snapshot timestamps of a domain, oldest first. Unknown domain yields an empty list.
    pub async fn list_timestamps(&self, domain: &str) -> Vec<String> {
        let Ok(domain) = checked_component(domain) else {
            return Vec::new();
        };
        let dir = self.root.join(domain);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to list snapshots in {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut timestamps = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Snapshot listing of {} is incomplete: {}", dir.display(), e);
                    break;
                }
            };

            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                timestamps.push(name.to_string());
            }
        }

        timestamps.sort();
        timestamps
    }

    /// Snapshot timestamps of a domain, newest first
    pub async fn list_versions(&self, domain: &str) -> Vec<String> {
        let mut versions = self.list_timestamps(domain).await;
        versions.reverse();
        versions
    }

    /// All HTML pages of a snapshot as sorted `/`-separated relative paths
    pub async fn list_pages(&self, domain: &str, timestamp: &str) -> Vec<String> {
        let Ok(dir) = self.snapshot_dir(domain, timestamp) else {
            return Vec::new();
        };

        let walk = tokio::task::spawn_blocking(move || collect_pages(&dir)).await;
        walk.unwrap_or_else(|e| {
            warn!("Page listing task failed: {}", e);
            Vec::new()
        })
    }

    /// Root `index.html` of a snapshot, if present
    pub async fn read_index(&self, domain: &str, timestamp: &str) -> Result<Option<String>, StoreError> {
        self.read_page(domain, timestamp, INDEX_PAGE).await
    }

    /// Raw HTML of a stored page
    pub async fn read_page(
        &self,
        domain: &str,
        timestamp: &str,
        path: &str,
    ) -> Result<Option<String>, StoreError> {
        let Some(bytes) = self.read_bytes(domain, timestamp, path).await? else {
            return Ok(None);
        };
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Any stored file: HTML as text, everything else as bytes with a content type
    pub async fn read_file(
        &self,
        domain: &str,
        timestamp: &str,
        path: &str,
    ) -> Result<Option<StoredFile>, StoreError> {
        let Some(bytes) = self.read_bytes(domain, timestamp, path).await? else {
            return Ok(None);
        };

        let file = if has_html_extension(path) {
            StoredFile::Html(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            StoredFile::Binary {
                bytes,
                content_type: content_type_for(path),
            }
        };
        Ok(Some(file))
    }

    async fn read_bytes(
        &self,
        domain: &str,
        timestamp: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let (Ok(dir), Ok(relative)) = (
            self.snapshot_dir(domain, timestamp),
            checked_relative_path(path),
        ) else {
            return Ok(None);
        };
        let full_path = dir.join(relative);

        match fs::metadata(&full_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&full_path, e)),
        }

        fs::read(&full_path)
            .await
            .map(Some)
            .map_err(|e| StoreError::io(&full_path, e))
    }
}

fn collect_pages(dir: &Path) -> Vec<String> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut pages: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| {
            entry
                .map_err(|e| warn!("Skipping unreadable entry under {}: {}", dir.display(), e))
                .ok()
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_html_extension(&entry.file_name().to_string_lossy()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(dir).ok()?;
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(parts.join("/"))
        })
        .collect();

    pages.sort();
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_with_snapshot() -> (TempDir, SnapshotStore, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let dir = store
            .create_snapshot("example.com", "2026-01-01T00:00:00.000000")
            .await
            .unwrap();
        (tmp, store, dir)
    }

    #[test]
    fn test_checked_component_rejects_traversal() {
        assert!(checked_component("..").is_err());
        assert!(checked_component(".").is_err());
        assert!(checked_component("").is_err());
        assert!(checked_component("a/b").is_err());
        assert!(checked_component("a\\b").is_err());
        assert!(checked_component("example.com").is_ok());
        assert!(checked_component("127.0.0.1:8080").is_ok());
    }

    #[test]
    fn test_checked_relative_path() {
        assert_eq!(
            checked_relative_path("/docs/intro.html").unwrap(),
            PathBuf::from("docs").join("intro.html")
        );
        assert!(checked_relative_path("../etc/passwd").is_err());
        assert!(checked_relative_path("docs/../../x").is_err());
        assert!(checked_relative_path("").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("logo.png"), "image/png");
        assert_eq!(content_type_for("static_site.CSS"), "text/css");
        assert_eq!(content_type_for("no-extension"), "application/octet-stream");
        assert_eq!(content_type_for("font.otf"), "font/otf");
        assert_eq!(content_type_for("clip.mp4"), "video/mp4");
    }

    #[tokio::test]
    async fn test_list_timestamps_unknown_domain_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());

        assert!(store.list_timestamps("example.com").await.is_empty());
        assert!(store.list_timestamps("..").await.is_empty());
    }

    #[tokio::test]
    async fn test_list_timestamps_sorted_and_versions_reversed() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        for ts in [
            "2026-03-01T00:00:00.000000",
            "2025-12-31T23:59:59.999999",
            "2026-01-15T12:00:00.000000",
        ] {
            store.create_snapshot("example.com", ts).await.unwrap();
        }
        // Stray files are not snapshots
        std::fs::write(tmp.path().join("example.com").join("notes.txt"), "x").unwrap();

        assert_eq!(
            store.list_timestamps("example.com").await,
            vec![
                "2025-12-31T23:59:59.999999",
                "2026-01-15T12:00:00.000000",
                "2026-03-01T00:00:00.000000",
            ]
        );
        assert_eq!(
            store.list_versions("example.com").await,
            vec![
                "2026-03-01T00:00:00.000000",
                "2026-01-15T12:00:00.000000",
                "2025-12-31T23:59:59.999999",
            ]
        );
    }

    #[tokio::test]
    async fn test_write_and_list_pages() {
        let (_tmp, store, dir) = store_with_snapshot().await;
        store.write_page(&dir, "index.html", "<p>home</p>").await.unwrap();
        store
            .write_page(&dir, "docs/intro.html", "<p>intro</p>")
            .await
            .unwrap();
        std::fs::write(dir.join("logo.png"), [0u8, 1, 2]).unwrap();

        let pages = store
            .list_pages("example.com", "2026-01-01T00:00:00.000000")
            .await;
        assert_eq!(pages, vec!["docs/intro.html", "index.html"]);
    }

    #[tokio::test]
    async fn test_list_pages_missing_snapshot_is_empty() {
        let (_tmp, store, _dir) = store_with_snapshot().await;

        assert!(store.list_pages("example.com", "bad-timestamp").await.is_empty());
        assert!(store.list_pages("unknown.org", "x").await.is_empty());
    }

    #[tokio::test]
    async fn test_write_page_rejects_traversal() {
        let (_tmp, store, dir) = store_with_snapshot().await;

        let result = store.write_page(&dir, "../escape.html", "x").await;
        assert!(matches!(result, Err(StoreError::UnsafePath(_))));
    }

    #[tokio::test]
    async fn test_read_page_and_index() {
        let (_tmp, store, dir) = store_with_snapshot().await;
        let ts = "2026-01-01T00:00:00.000000";

        assert_eq!(store.read_index("example.com", ts).await.unwrap(), None);

        store.write_page(&dir, "index.html", "<p>home</p>").await.unwrap();
        assert_eq!(
            store.read_index("example.com", ts).await.unwrap().as_deref(),
            Some("<p>home</p>")
        );
        assert_eq!(store.read_page("example.com", ts, "missing.html").await.unwrap(), None);
        assert_eq!(store.read_page("example.com", ts, "../../x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_file_distinguishes_html_and_binary() {
        let (_tmp, store, dir) = store_with_snapshot().await;
        let ts = "2026-01-01T00:00:00.000000";
        store.write_page(&dir, "about.html", "<h1>About</h1>").await.unwrap();
        std::fs::write(dir.join("logo.png"), [137u8, 80, 78, 71]).unwrap();
        std::fs::create_dir_all(dir.join("docs")).unwrap();

        assert_eq!(
            store.read_file("example.com", ts, "about.html").await.unwrap(),
            Some(StoredFile::Html("<h1>About</h1>".to_string()))
        );
        assert_eq!(
            store.read_file("example.com", ts, "logo.png").await.unwrap(),
            Some(StoredFile::Binary {
                bytes: vec![137, 80, 78, 71],
                content_type: "image/png".to_string(),
            })
        );
        // Directories are not files
        assert_eq!(store.read_file("example.com", ts, "docs").await.unwrap(), None);
    }
}
