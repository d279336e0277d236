//! Classification of responses from an arbitrary, often misconfigured,
//! web server: genuine repository content vs. soft-404 pages, directory
//! indexes, redirects and empty bodies.

use reqwest::blocking::Response;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use thiserror::Error;
use url::Url;

/// Why a response was rejected. Rendered verbatim in the per-task warning.
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum Reject {
    #[error("responded with status code {}", .0.as_u16())]
    Status(reqwest::StatusCode),
    #[error("responded with a zero-length body")]
    EmptyBody,
    #[error("responded with HTML")]
    Html,
}

/// Check a response for usable repository content, earliest condition wins.
///
/// `html_ok` is only set by the directory-index crawler, where HTML is the
/// expected shape rather than a soft-404 tell.
pub(crate) fn verify(response: &Response, html_ok: bool) -> Result<(), Reject> {
    if response.status().as_u16() != 200 {
        return Err(Reject::Status(response.status()));
    }
    if let Some(length) = response.headers().get(CONTENT_LENGTH) {
        if length.to_str().map(str::trim).ok() == Some("0") {
            return Err(Reject::EmptyBody);
        }
    }
    if !html_ok && is_html(response) {
        return Err(Reject::Html);
    }
    Ok(())
}

pub(crate) fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("text/html"))
}

/// Extract the file names advertised by a directory-index page.
///
/// Anchors pointing outside the listing are discarded: absolute paths,
/// anything with a scheme or host, and the `.`/`..` self-references a
/// server likes to decorate its listings with.
pub(crate) fn indexed_files(html: &str) -> Vec<String> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return Vec::new();
    };

    dom.nodes()
        .iter()
        .filter_map(|node| node.as_tag())
        .filter(|tag| tag.name().as_bytes() == b"a")
        .filter_map(|anchor| {
            let href = anchor.attributes().get("href").flatten()?;
            href_path(std::str::from_utf8(href.as_bytes()).ok()?)
        })
        .collect()
}

/// The path component of an href, if it stays inside the current listing.
fn href_path(href: &str) -> Option<String> {
    // A parseable absolute URL has a scheme (and usually a host); either
    // way it does not name a sibling of the current page.
    if Url::parse(href).is_ok() {
        return None;
    }

    let path = href.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() || path.starts_with('/') {
        return None;
    }
    if matches!(path, "." | ".." | "../") {
        return None;
    }
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn index_keeps_relative_entries_only() {
        let html = r#"
            <html><head><title>Index of /.git</title></head><body>
            <a href="../">Parent Directory</a>
            <a href="HEAD">HEAD</a>
            <a href="objects/">objects/</a>
            <a href="refs/">refs/</a>
            <a href="/absolute">absolute</a>
            <a href="https://example.com/evil">evil</a>
            <a href="?C=N;O=D">Name</a>
            <a href=".">.</a>
            <a href="..">..</a>
            <a href="config#fragment">config</a>
            </body></html>
        "#;
        assert_eq!(
            indexed_files(html),
            vec!["HEAD", "objects/", "refs/", "config"]
        );
    }

    #[test]
    fn index_of_garbage_is_empty() {
        assert_eq!(indexed_files("not html at all"), Vec::<String>::new());
        assert_eq!(indexed_files(""), Vec::<String>::new());
    }

    #[test]
    fn href_paths() {
        assert_eq!(href_path("subdir/?C=N"), Some("subdir/".into()));
        assert_eq!(href_path("mailto:admin@example.com"), None);
        assert_eq!(href_path("//cdn.example.com/x"), None);
        assert_eq!(href_path(""), None);
    }
}
