// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Mapping of URL paths to filesystem-safe names inside a snapshot.

use url::Url;

/// Inputs longer than this (in characters) are replaced by a hash name
pub const MAX_FILENAME_CHARS: usize = 200;

/// Name used for the page at the root of a domain
pub const INDEX_PAGE: &str = "index.html";

const UNSAFE_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Convert a URL path (or a single segment) to a safe filename.
///
/// Query string and fragment are dropped. Long inputs become
/// `md5(input) + ".html"`, everything else has each of `< > : " / \ | ? *`
/// replaced by `_`.
pub fn sanitize_filename(input: &str) -> String {
    let stripped = input
        .split('?')
        .next()
        .unwrap_or_default()
        .split('#')
        .next()
        .unwrap_or_default();

    if stripped.chars().count() > MAX_FILENAME_CHARS {
        return hashed_name(stripped);
    }

    let sanitized: String = stripped
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect();

    // "." and ".." would resolve outside the intended directory
    if sanitized == "." || sanitized == ".." {
        return hashed_name(stripped);
    }

    sanitized
}

fn hashed_name(input: &str) -> String {
    format!("{:x}.html", md5::compute(input.as_bytes()))
}

/// Whether a file name already carries an HTML extension
pub fn has_html_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Relative page path for a crawled URL, e.g. `https://a.com/docs/intro` -> `docs/intro.html`.
pub fn page_path_for_url(url: &Url) -> String {
    let mut segments: Vec<String> = url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(sanitize_filename)
        .filter(|segment| !segment.is_empty())
        .collect();

    let Some(last) = segments.last_mut() else {
        return INDEX_PAGE.to_string();
    };

    if !has_html_extension(last) {
        last.push_str(".html");
    }

    segments.join("/")
}
