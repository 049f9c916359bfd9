// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Network authority of a URL (`host[:port]`), used as the archive domain.
/// User info is never part of it, so credentials do not end up in directory names.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Whether `url` shares the given authority
pub fn is_same_domain(url: &Url, domain: &str) -> bool {
    authority(url).as_deref() == Some(domain)
}

/// Resolve an attribute value against a base URL
pub fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Extract same-domain links from HTML content.
/// Every `a[href]` is resolved against `base_url`; only http(s) URLs with the
/// base URL's authority are kept.
pub fn extract_links(html: &str, base_url: &Url) -> HashSet<Url> {
    let mut links = HashSet::new();

    let Some(domain) = authority(base_url) else {
        return links;
    };

    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(resolved) = resolve_url(base_url, href) else {
            continue;
        };

        if matches!(resolved.scheme(), "http" | "https") && is_same_domain(&resolved, &domain) {
            links.insert(resolved);
        }
    }

    links
}
