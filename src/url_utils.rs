//! URL helper functions used throughout the crawler

use url::Url;

/// Parse and normalize a URL into its canonical crawl form.
///
/// Normalization lowercases the host, strips known default ports, resolves
/// `.`/`..` path segments, re-encodes reserved characters and removes the
/// fragment. Non-http(s) URLs and unparseable input yield `None`.
pub fn normalize(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw.trim()).ok()?;

    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    // A URL without a host is useless to the crawler.
    url.host_str()?;

    url.set_fragment(None);
    Some(url)
}

/// Extract the host portion of a URL
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|s| s.to_string())
}

/// Build the robots.txt URL for the host serving the given URL
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;

    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}

/// Check if a content type represents HTML
pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("text/html") || lower.starts_with("application/xhtml+xml")
}
