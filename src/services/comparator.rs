// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::compare::DiffResult;
use crate::services::store::{SnapshotStore, StoreError};
use scraper::{ElementRef, Html, Selector};
use similar::TextDiff;
use std::collections::BTreeSet;
use thiserror::Error;

/// Lines of unchanged context around each hunk
const DIFF_CONTEXT_LINES: usize = 3;

/// Elements whose content is never visible text
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Elements that start a new line in the extracted text
const BLOCK_ELEMENTS: [&str; 37] = [
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "details", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5",
    "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "td", "th", "tr", "ul",
];

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Page {path} not found in snapshot {timestamp}")]
    NotFound { timestamp: String, path: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn walk_text(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }

    let is_block = BLOCK_ELEMENTS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            walk_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            // Line breaks inside a text node are layout, not structure
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        }
    }

    if is_block {
        out.push('\n');
    }
}

/// Visible text of a document, one block per line.
/// Whitespace runs collapse to a single space and empty lines are dropped.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    walk_text(document.root_element(), &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Set of `img src` values in a document
pub fn image_sources(html: &str) -> BTreeSet<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img[src]") else {
        return BTreeSet::new();
    };

    document
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect()
}

fn with_trailing_newline(text: String) -> String {
    if text.is_empty() {
        text
    } else {
        text + "\n"
    }
}

/// Unified diff between two extracted texts, as individual lines
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> Vec<String> {
    let old = with_trailing_newline(old.to_string());
    let new = with_trailing_newline(new.to_string());

    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(DIFF_CONTEXT_LINES)
        .header(old_label, new_label)
        .to_string()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Compare two raw versions of a page
pub fn diff_pages(old_html: &str, new_html: &str, timestamp1: &str, timestamp2: &str) -> DiffResult {
    let diff = unified_diff(
        &extract_text(old_html),
        &extract_text(new_html),
        timestamp1,
        timestamp2,
    );

    let old_images = image_sources(old_html);
    let new_images = image_sources(new_html);

    DiffResult {
        diff,
        added_images: new_images.difference(&old_images).cloned().collect(),
        removed_images: old_images.difference(&new_images).cloned().collect(),
        timestamp1: timestamp1.to_string(),
        timestamp2: timestamp2.to_string(),
    }
}

async fn load_page(
    store: &SnapshotStore,
    domain: &str,
    timestamp: &str,
    path: &str,
) -> Result<String, CompareError> {
    store
        .read_page(domain, timestamp, path)
        .await?
        .ok_or_else(|| CompareError::NotFound {
            timestamp: timestamp.to_string(),
            path: path.to_string(),
        })
}

/// Load a page from two snapshots and compare them
pub async fn compare(
    store: &SnapshotStore,
    domain: &str,
    timestamp1: &str,
    timestamp2: &str,
    path: &str,
) -> Result<DiffResult, CompareError> {
    let old_html = load_page(store, domain, timestamp1, path).await?;
    let new_html = load_page(store, domain, timestamp2, path).await?;

    Ok(diff_pages(&old_html, &new_html, timestamp1, timestamp2))
}
