// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::services::fetcher::{FetchError, Fetcher};
use crate::services::links::{authority, is_same_domain, resolve_url};
use crate::services::logging::redact_url;
use crate::services::rewriter::{asset_references, localize_assets};
use crate::services::sanitize::sanitize_filename;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

/// Maximum number of assets of one page downloaded at the same time
const ASSET_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
enum LocalizeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Asset URL has no usable local name")]
    EmptyName,
}

/// Relative snapshot path for an asset URL.
///
/// Same-domain assets use their path (and query); the leading `/` is dropped and
/// the rest is sanitized, which flattens directories into `_`.
pub fn asset_local_path(asset_url: &Url, base_url: &Url) -> String {
    let raw = match authority(base_url) {
        Some(domain) if is_same_domain(asset_url, &domain) => match asset_url.query() {
            Some(query) => format!("{}?{}", asset_url.path(), query),
            None => asset_url.path().to_string(),
        },
        _ => asset_url.to_string(),
    };

    sanitize_filename(raw.strip_prefix('/').unwrap_or(&raw))
}

/// Download one asset into the snapshot and return its relative path.
///
/// Any failure (transport, non-success status, write error) is logged and the
/// original absolute URL is returned instead, so the page keeps a working reference.
pub async fn localize_asset(
    fetcher: &Fetcher,
    asset_url: &Url,
    base_url: &Url,
    snapshot_root: &Path,
) -> String {
    match download(fetcher, asset_url, base_url, snapshot_root).await {
        Ok(local) => {
            debug!("Stored asset {} as {}", redact_url(asset_url), local);
            local
        }
        Err(e) => {
            warn!("Error downloading asset {}: {}", redact_url(asset_url), e);
            asset_url.to_string()
        }
    }
}

async fn download(
    fetcher: &Fetcher,
    asset_url: &Url,
    base_url: &Url,
    snapshot_root: &Path,
) -> Result<String, LocalizeError> {
    let mut body = fetcher.get_stream(asset_url).await?;

    let local = asset_local_path(asset_url, base_url);
    if local.is_empty() {
        return Err(LocalizeError::EmptyName);
    }

    let full_path = snapshot_root.join(&local);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(&full_path).await?;
    let written = async {
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok::<(), LocalizeError>(())
    }
    .await;

    if written.is_err() {
        // A truncated asset is worse than a remote reference
        drop(file);
        let _ = fs::remove_file(&full_path).await;
    }

    written.map(|()| local)
}

/// Localize every same-domain asset referenced by a page.
///
/// Distinct asset URLs are downloaded concurrently, each at most once per page.
/// Cross-domain references are left as written.
pub async fn localize_page(
    fetcher: &Fetcher,
    html: &str,
    page_url: &Url,
    snapshot_root: &Path,
) -> String {
    let Some(domain) = authority(page_url) else {
        return html.to_string();
    };

    // Raw attribute values grouped by the asset URL they resolve to
    let mut by_url: HashMap<Url, Vec<String>> = HashMap::new();
    for reference in asset_references(html) {
        let Some(resolved) = resolve_url(page_url, &reference.url_text()) else {
            continue;
        };
        if !is_same_domain(&resolved, &domain) {
            continue;
        }
        let values = by_url.entry(resolved).or_default();
        if !values.contains(&reference.value) {
            values.push(reference.value);
        }
    }

    let localized: Vec<(Vec<String>, String)> = stream::iter(by_url)
        .map(|(asset_url, values)| async move {
            let local = localize_asset(fetcher, &asset_url, page_url, snapshot_root).await;
            (values, local)
        })
        .buffer_unordered(ASSET_CONCURRENCY)
        .collect()
        .await;

    let replacements: HashMap<String, String> = localized
        .into_iter()
        .flat_map(|(values, local)| values.into_iter().map(move |v| (v, local.clone())))
        .collect();

    localize_assets(html, &replacements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/page").unwrap()
    }

    #[test]
    fn test_asset_local_path_strips_leading_slash() {
        let url = Url::parse("http://example.com/logo.png").unwrap();
        assert_eq!(asset_local_path(&url, &base()), "logo.png");
    }

    #[test]
    fn test_asset_local_path_flattens_directories() {
        let url = Url::parse("http://example.com/static/css/site.css").unwrap();
        assert_eq!(asset_local_path(&url, &base()), "static_css_site.css");
    }

    #[test]
    fn test_asset_local_path_drops_query() {
        let url = Url::parse("http://example.com/app.js?v=42").unwrap();
        assert_eq!(asset_local_path(&url, &base()), "app.js");
    }

    #[test]
    fn test_asset_local_path_long_path_is_hashed() {
        let long = format!("http://example.com/{}.png", "x".repeat(250));
        let url = Url::parse(&long).unwrap();

        let local = asset_local_path(&url, &base());
        assert_eq!(local.len(), 37);
        assert!(local.ends_with(".html"));
    }

    #[tokio::test]
    async fn test_localize_asset_fetch_error_keeps_original_url() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new("TestBot/0.1", std::time::Duration::from_secs(2)).unwrap();
        let asset = Url::parse("http://127.0.0.1:9/logo.png").unwrap();
        let page = Url::parse("http://127.0.0.1:9/").unwrap();

        let local = localize_asset(&fetcher, &asset, &page, dir.path()).await;
        assert_eq!(local, "http://127.0.0.1:9/logo.png");
        assert!(!dir.path().join("logo.png").exists());
    }

    #[tokio::test]
    async fn test_localize_page_failed_fetch_becomes_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new("TestBot/0.1", std::time::Duration::from_secs(2)).unwrap();
        let page = Url::parse("http://127.0.0.1:9/").unwrap();
        let html = r#"<img src="/logo.png"><img src="https://cdn.other.org/a.png">"#;

        let out = localize_page(&fetcher, html, &page, dir.path()).await;
        assert!(out.contains(r#"src="http://127.0.0.1:9/logo.png""#));
        assert!(out.contains(r#"src="https://cdn.other.org/a.png""#));
    }

    #[tokio::test]
    async fn test_localize_page_requests_decoded_asset_url() {
        use axum::{http::header, http::Uri, routing::get, Router};
        use std::sync::{Arc, Mutex};

        let queries = Arc::new(Mutex::new(Vec::new()));
        let recorded = queries.clone();
        let app = Router::new().route(
            "/img",
            get(move |uri: Uri| {
                let recorded = recorded.clone();
                async move {
                    recorded
                        .lock()
                        .unwrap()
                        .push(uri.query().unwrap_or_default().to_string());
                    ([(header::CONTENT_TYPE, "image/png")], vec![1u8, 2, 3])
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new("TestBot/0.1", std::time::Duration::from_secs(5)).unwrap();
        let page = Url::parse(&format!("http://{}/", addr)).unwrap();
        let html = r#"<img src="/img?a=1&amp;b=2">"#;

        let out = localize_page(&fetcher, html, &page, dir.path()).await;

        assert_eq!(*queries.lock().unwrap(), vec!["a=1&b=2"]);
        // The raw attribute text is what gets replaced
        assert!(out.contains(r#"<img src="img">"#));
        assert_eq!(std::fs::read(dir.path().join("img")).unwrap(), vec![1, 2, 3]);
    }
}
