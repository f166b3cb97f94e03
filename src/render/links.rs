//! Plain-text URL detection.
//!
//! Fallback used when the body did not come from HTML, or the HTML had no
//! anchors: bare `http(s)://` URLs are numbered and replaced by `[n]`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::link::LinkRef;

/// `http(s)://` followed by a greedy run of non-whitespace characters.
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("URL pattern is valid"));

/// Replace every URL in `body` with a `[n]` marker.
///
/// Returns the rewritten body and one [`LinkRef`] per match, numbered from 1
/// in encounter order.
pub fn detect_links(body: &str) -> (String, Vec<LinkRef>) {
    let mut links = Vec::new();
    let rewritten = URL_RE.replace_all(body, |caps: &regex::Captures<'_>| {
        let url = caps[0].to_string();
        let index = links.len() + 1;
        links.push(LinkRef {
            index,
            url: url.clone(),
            text: url,
        });
        format!("[{index}]")
    });
    (rewritten.into_owned(), links)
}
