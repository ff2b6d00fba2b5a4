//! HTML extraction: page metadata, outbound links and keyword frequencies.
//!
//! Everything here is a pure transform over the fetched bytes; no I/O.

use crate::url_utils;
use crate::words::{self, WordFilter};
use scraper::{Html, Node, Selector};
use std::collections::HashMap;
use url::Url;

/// Longest title kept, in characters.
pub const MAX_TITLE_LENGTH: usize = 256;
/// Longest description kept, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// An outbound link with its anchor count on the source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub frequency: u64,
}

/// Everything the crawler keeps from one fetched page.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub links: Vec<Link>,
    pub keywords: HashMap<String, u64>,
}

/// Extract metadata, links and keywords from an HTML document.
///
/// `base_url` is the final URL the body was served from; relative hrefs are
/// resolved against it. Malformed HTML is parsed leniently and never fails.
pub fn extract(base_url: &Url, body: &str, filter: &WordFilter) -> ExtractedPage {
    let document = Html::parse_document(body);

    ExtractedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        links: extract_links(&document, base_url),
        keywords: words::keywords(&visible_text(&document), filter),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("Invalid CSS selector");
    let element = document.select(&selector).next()?;
    let title = element.text().collect::<String>();
    let title = title.trim();

    if title.is_empty() {
        None
    } else {
        Some(clamp_chars(title, MAX_TITLE_LENGTH))
    }
}

fn extract_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta").expect("Invalid CSS selector");

    for element in document.select(&selector) {
        let named_description = element
            .value()
            .attr("name")
            .is_some_and(|name| name.eq_ignore_ascii_case("description"));
        if !named_description {
            continue;
        }

        // Only the first matching meta element counts.
        let content = element.value().attr("content")?.trim();
        if content.is_empty() {
            return None;
        }
        return Some(clamp_chars(content, MAX_DESCRIPTION_LENGTH));
    }

    None
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<Link> {
    let selector = Selector::parse("a[href]").expect("Invalid CSS selector");
    let base = url_utils::normalize(base_url.as_str());
    let mut counts: HashMap<String, u64> = HashMap::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base_url.join(href.trim()) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        // Fragment-bearing links point inside a document, not at one.
        if resolved.fragment().is_some_and(|f| !f.is_empty()) {
            continue;
        }
        let Some(normalized) = url_utils::normalize(resolved.as_str()) else {
            continue;
        };
        if base.as_ref() == Some(&normalized) {
            continue;
        }

        *counts.entry(normalized.into()).or_insert(0) += 1;
    }

    let mut links: Vec<Link> = counts
        .into_iter()
        .map(|(url, frequency)| Link { url, frequency })
        .collect();
    links.sort_by(|a, b| a.url.cmp(&b.url));
    links
}

/// Collect the text of every visible node, skipping script, style and
/// noscript subtrees. Walks with an explicit stack so arbitrarily deep
/// documents cannot overflow the call stack.
fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    let mut stack = vec![document.tree.root()];

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Element(element) => {
                let name = element.name();
                if name.eq_ignore_ascii_case("script")
                    || name.eq_ignore_ascii_case("style")
                    || name.eq_ignore_ascii_case("noscript")
                {
                    continue;
                }
            }
            Node::Text(chunk) => {
                text.push_str(chunk);
                text.push(' ');
            }
            _ => {}
        }

        for child in node.children() {
            stack.push(child);
        }
    }

    text
}

fn clamp_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn filter() -> WordFilter {
        WordFilter {
            stop_words: HashSet::new(),
            min_length: 2,
            max_length: 128,
            min_frequency: 1,
            max_frequency: 1024,
        }
    }

    fn base() -> Url {
        Url::parse("http://h/a").unwrap()
    }

    #[test]
    fn test_extracts_title_and_description() {
        let html = r#"<html><head>
            <title> The Page </title>
            <meta NAME="Description" content="  A page about things. ">
        </head><body>text</body></html>"#;
        let page = extract(&base(), html, &filter());
        assert_eq!(page.title.as_deref(), Some("The Page"));
        assert_eq!(page.description.as_deref(), Some("A page about things."));
    }

    #[test]
    fn test_missing_title_and_description_are_none() {
        let page = extract(&base(), "<html><body>no head here</body></html>", &filter());
        assert!(page.title.is_none());
        assert!(page.description.is_none());
    }

    #[test]
    fn test_title_is_clamped() {
        let html = format!("<title>{}</title>", "x".repeat(MAX_TITLE_LENGTH + 50));
        let page = extract(&base(), &html, &filter());
        assert_eq!(page.title.unwrap().chars().count(), MAX_TITLE_LENGTH);
    }

    #[test]
    fn test_keyword_counts_for_simple_body() {
        let page = extract(&base(), "<html><body>Hello world hello</body></html>", &filter());
        assert_eq!(page.keywords.get("hello"), Some(&2));
        assert_eq!(page.keywords.get("world"), Some(&1));
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_script_and_style_text_is_not_indexed() {
        let html = r#"<html><body>
            visible
            <script>var hidden = "scriptword";</script>
            <style>.hidden { color: red; }</style>
            <noscript>noscriptword</noscript>
        </body></html>"#;
        let page = extract(&base(), html, &filter());
        assert!(page.keywords.contains_key("visibl"));
        assert!(!page.keywords.contains_key("scriptword"));
        assert!(!page.keywords.contains_key("hidden"));
        assert!(!page.keywords.contains_key("noscriptword"));
    }

    #[test]
    fn test_links_resolve_and_filter() {
        let html = r#"<html><body>
            <a href="/b">rel</a>
            <a href="http://h/b">abs</a>
            <a href="http://h/c#section">fragment</a>
            <a href="ftp://h/d">scheme</a>
            <a href="http://h/a">self</a>
            <a href="http://[bad">bad</a>
        </body></html>"#;
        let page = extract(&base(), html, &filter());
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].url, "http://h/b");
        // "/b" and "http://h/b" collapse into one link with frequency 2.
        assert_eq!(page.links[0].frequency, 2);
    }

    #[test]
    fn test_malformed_html_does_not_panic() {
        let html = "<html><body><a href=\"http://h/x\">open<div><p>unclosed";
        let page = extract(&base(), html, &filter());
        assert_eq!(page.links.len(), 1);
    }
}
