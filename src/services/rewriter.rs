// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! HTML rewriting built on `lol_html`.
//!
//! This is the only module that knows about the rewriting parser. Callers work
//! with plain strings and maps:
//! - [`asset_references`] collects `img[src]`, stylesheet `link[href]` and `script[src]` values
//! - [`localize_assets`] replaces those values from a map built by the localizer
//! - [`rewrite_navigation`] points anchors at the browse route and injects `<base>`

use crate::services::links::{is_same_domain, resolve_url};
use crate::services::sanitize::page_path_for_url;
use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use lol_html::errors::{AttributeNameError, RewritingError};
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, rewrite_str, RewriteStrSettings};
use std::cell::{Cell, RefCell};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::warn;
use url::Url;

/// Kind of asset tag an attribute came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Image,
    Stylesheet,
    Script,
}

impl AssetKind {
    /// Attribute holding the asset URL
    pub fn attribute(&self) -> &'static str {
        match self {
            AssetKind::Image | AssetKind::Script => "src",
            AssetKind::Stylesheet => "href",
        }
    }
}

/// Raw asset reference as written in the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetReference {
    pub kind: AssetKind,
    /// Attribute text as it appears in the markup, character references included
    pub value: String,
}

impl AssetReference {
    /// Attribute value with character references decoded, i.e. the URL the browser requests
    pub fn url_text(&self) -> Cow<'_, str> {
        decode_html_entities(&self.value)
    }
}

/// Snapshot page being served through the browse route
#[derive(Debug, Clone)]
pub struct BrowseView<'a> {
    pub domain: &'a str,
    pub timestamp: &'a str,
    /// Page path relative to the snapshot root, e.g. `docs/intro.html`
    pub page_path: &'a str,
}

impl BrowseView<'_> {
    /// Root of the raw snapshot route, used as the `<base>` target
    pub fn asset_root(&self) -> String {
        format!("/archives/{}/{}/", self.domain, self.timestamp)
    }

    fn page_route(&self, page_path: &str) -> String {
        format!("/archives/{}/{}/page/{}", self.domain, self.timestamp, page_path)
    }

    /// Original location of the page, used to resolve relative anchors
    fn original_url(&self) -> Option<Url> {
        Url::parse(&format!("http://{}/{}", self.domain, self.page_path)).ok()
    }
}

fn is_stylesheet(el: &Element) -> bool {
    el.get_attribute("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

fn collect(found: &RefCell<Vec<AssetReference>>, el: &Element, kind: AssetKind) {
    if let Some(value) = el.get_attribute(kind.attribute()) {
        found.borrow_mut().push(AssetReference { kind, value });
    }
}

fn replace(
    replacements: &HashMap<String, String>,
    el: &mut Element,
    kind: AssetKind,
) -> Result<(), AttributeNameError> {
    let attribute = kind.attribute();
    match el
        .get_attribute(attribute)
        .and_then(|value| replacements.get(&value))
    {
        Some(local) => el.set_attribute(attribute, local),
        None => Ok(()),
    }
}

/// Collect asset references in document order
pub fn asset_references(html: &str) -> Vec<AssetReference> {
    let found = RefCell::new(Vec::new());

    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img[src]", |el| {
                    collect(&found, el, AssetKind::Image);
                    Ok(())
                }),
                element!("link[href]", |el| {
                    if is_stylesheet(el) {
                        collect(&found, el, AssetKind::Stylesheet);
                    }
                    Ok(())
                }),
                element!("script[src]", |el| {
                    collect(&found, el, AssetKind::Script);
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    );

    if let Err(e) = result {
        warn!("Failed to scan asset references: {}", e);
    }

    found.into_inner()
}

/// Replace asset attribute values that have an entry in `replacements`.
/// Values without an entry (cross-domain, failed fetches) are left untouched.
pub fn localize_assets(html: &str, replacements: &HashMap<String, String>) -> String {
    if replacements.is_empty() {
        return html.to_string();
    }

    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img[src]", |el| {
                    replace(replacements, el, AssetKind::Image)?;
                    Ok(())
                }),
                element!("link[href]", |el| {
                    if is_stylesheet(el) {
                        replace(replacements, el, AssetKind::Stylesheet)?;
                    }
                    Ok(())
                }),
                element!("script[src]", |el| {
                    replace(replacements, el, AssetKind::Script)?;
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    );

    unwrap_or_original(result, html)
}

/// Browse-route target for an anchor, or `None` when the anchor must stay as is
fn browse_href(href: &str, view: &BrowseView, page_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = resolve_url(page_url, &decode_html_entities(href))?;
    if !matches!(resolved.scheme(), "http" | "https") || !is_same_domain(&resolved, view.domain)
    {
        return None;
    }

    let mut target = view.page_route(&page_path_for_url(&resolved));
    if let Some(fragment) = resolved.fragment() {
        target.push('#');
        target.push_str(fragment);
    }
    Some(target)
}

/// Rewrite a stored page for the browse view.
///
/// Internal anchors point at the browse route and a `<base>` element targets the
/// snapshot root so remaining relative references load from the archive. Asset
/// tags are not touched.
pub fn rewrite_navigation(html: &str, view: &BrowseView) -> String {
    let Some(page_url) = view.original_url() else {
        return html.to_string();
    };

    let base_tag = format!(
        "<base href=\"{}\">",
        encode_double_quoted_attribute(&view.asset_root())
    );
    let base_inserted = Cell::new(false);

    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("head", |el| {
                    if !base_inserted.replace(true) {
                        el.prepend(&base_tag, ContentType::Html);
                    }
                    Ok(())
                }),
                element!("body", |el| {
                    if !base_inserted.replace(true) {
                        el.before(&format!("<head>{}</head>", base_tag), ContentType::Html);
                    }
                    Ok(())
                }),
                element!("a[href]", |el| {
                    if let Some(target) = el
                        .get_attribute("href")
                        .and_then(|href| browse_href(&href, view, &page_url))
                    {
                        el.set_attribute("href", &target)?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    );

    let rewritten = unwrap_or_original(result, html);
    if base_inserted.get() {
        rewritten
    } else {
        format!("<head>{}</head>{}", base_tag, rewritten)
    }
}

fn unwrap_or_original(result: Result<String, RewritingError>, html: &str) -> String {
    result.unwrap_or_else(|e| {
        warn!("HTML rewrite failed, keeping original markup: {}", e);
        html.to_string()
    })
}
