// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::archive::ArchiveOutcome;
use crate::services::fetcher::{FetchError, Fetcher};
use crate::services::links::{authority, extract_links};
use crate::services::localizer::localize_page;
use crate::services::logging::redact_url;
use crate::services::sanitize::page_path_for_url;
use crate::services::store::{SnapshotStore, StoreError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Errors that abort a whole archive request
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Snapshot storage failed: {0}")]
    Storage(#[from] StoreError),
}

/// Failure of a single page; logged and skipped by the crawl loop
#[derive(Debug, Error)]
enum PageError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("write failed: {0}")]
    Store(#[from] StoreError),
}

/// Optional bounds on one archive run
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlLimits {
    /// Maximum number of URLs admitted to the visited set
    pub max_pages: Option<usize>,
    /// Wall-clock budget; pages already written stay intact when it runs out
    pub time_budget: Option<Duration>,
}

/// Snapshot directory name for an instant: ISO-8601 with microseconds, no offset
pub fn snapshot_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// State of one archive run. Never shared between runs.
struct CrawlRun {
    snapshot_dir: PathBuf,
    visited: HashSet<Url>,
    pending: Vec<Url>,
    pages_written: usize,
    limits: CrawlLimits,
    deadline: Option<Instant>,
}

/// Outcome of trying to take the next URL off the work stack
enum Admission {
    Fetch(Url),
    Done,
    Truncated,
}

impl CrawlRun {
    fn new(snapshot_dir: PathBuf, seed: Url, limits: CrawlLimits) -> Self {
        Self {
            snapshot_dir,
            visited: HashSet::new(),
            pending: vec![crawl_key(seed)],
            pages_written: 0,
            limits,
            deadline: limits.time_budget.map(|budget| Instant::now() + budget),
        }
    }

    fn enqueue(&mut self, url: Url) {
        let url = crawl_key(url);
        if !self.visited.contains(&url) {
            self.pending.push(url);
        }
    }

    /// Pop URLs until one is admitted. Insertion into `visited` is the single
    /// test-and-set step, so a URL queued twice is fetched once.
    fn next(&mut self) -> Admission {
        while let Some(url) = self.pending.pop() {
            if self.visited.contains(&url) {
                continue;
            }

            let over_budget = self.deadline.is_some_and(|d| Instant::now() >= d);
            let over_limit = self
                .limits
                .max_pages
                .is_some_and(|max| self.visited.len() >= max);
            if over_budget || over_limit {
                return Admission::Truncated;
            }

            self.visited.insert(url.clone());
            return Admission::Fetch(url);
        }
        Admission::Done
    }
}

/// Fragments never reach the server, so they do not make a distinct page
fn crawl_key(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// Same-domain site archiver
#[derive(Debug, Clone)]
pub struct Archiver {
    fetcher: Fetcher,
    store: SnapshotStore,
    limits: CrawlLimits,
}

impl Archiver {
    pub fn new(fetcher: Fetcher, store: SnapshotStore, limits: CrawlLimits) -> Self {
        Self {
            fetcher,
            store,
            limits,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Crawl every page reachable from `seed` within its domain into a new snapshot.
    ///
    /// Only an invalid seed or an unwritable snapshot root fails the request.
    /// Page failures are logged and skipped; they still count in `pages_visited`.
    pub async fn archive(&self, seed: &str) -> Result<ArchiveOutcome, ArchiveError> {
        let seed = Url::parse(seed.trim())?;
        if !matches!(seed.scheme(), "http" | "https") {
            return Err(ArchiveError::UnsupportedScheme(seed.scheme().to_string()));
        }
        let domain = authority(&seed).ok_or(ArchiveError::MissingHost)?;
        let timestamp = snapshot_timestamp(Utc::now());

        let snapshot_dir = self.store.create_snapshot(&domain, &timestamp).await?;
        info!(
            "Archiving {} into {}/{}",
            redact_url(&seed),
            domain,
            timestamp
        );

        let mut run = CrawlRun::new(snapshot_dir, seed, self.limits);
        let mut truncated = false;

        loop {
            let url = match run.next() {
                Admission::Fetch(url) => url,
                Admission::Done => break,
                Admission::Truncated => {
                    truncated = true;
                    break;
                }
            };

            match self.archive_page(&run, &url).await {
                Ok(html) => {
                    run.pages_written += 1;
                    for link in extract_links(&html, &url) {
                        run.enqueue(link);
                    }
                }
                Err(e) => warn!("Error archiving {}: {}", redact_url(&url), e),
            }
        }

        if truncated {
            warn!(
                "Archive of {} stopped early with {} URLs still queued",
                domain,
                run.pending.len()
            );
        }

        let outcome = ArchiveOutcome {
            domain,
            timestamp,
            pages_visited: run.visited.len(),
            pages_written: run.pages_written,
            truncated,
        };
        info!(
            "Archived {} pages of {} ({} visited)",
            outcome.pages_written, outcome.domain, outcome.pages_visited
        );
        Ok(outcome)
    }

    /// Fetch, localize and store one page, returning the stored HTML
    async fn archive_page(&self, run: &CrawlRun, url: &Url) -> Result<String, PageError> {
        let html = self.fetcher.get_text(url).await?;

        let page_path = page_path_for_url(url);
        let rewritten = localize_page(&self.fetcher, &html, url, &run.snapshot_dir).await;

        self.store
            .write_page(&run.snapshot_dir, &page_path, &rewritten)
            .await?;
        debug!("Stored {} as {}", redact_url(url), page_path);

        Ok(rewritten)
    }
}
