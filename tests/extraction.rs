//! End-to-end scenarios over the pure core: extraction feeding the ranking
//! pipeline, without network or storage.

use chrono::Utc;
use rse::extractor;
use rse::models::PageRecord;
use rse::search::engine;
use rse::words::{self, WordFilter};
use std::collections::{HashMap, HashSet};
use url::Url;

fn filter() -> WordFilter {
    WordFilter {
        stop_words: ["the"].iter().map(|s| s.to_string()).collect(),
        min_length: 2,
        max_length: 128,
        min_frequency: 1,
        max_frequency: 1024,
    }
}

fn page(id: i64, url: &str) -> PageRecord {
    PageRecord {
        id,
        url: url.to_string(),
        title: None,
        description: None,
        last_crawled_at: Utc::now(),
    }
}

#[test]
fn single_page_is_extracted_and_found() {
    let base = Url::parse("http://h/a").unwrap();
    let body = "<html><head><title>Greeting</title></head>\
                <body>Hello world hello</body></html>";

    let extracted = extractor::extract(&base, body, &filter());

    assert_eq!(extracted.title.as_deref(), Some("Greeting"));
    assert_eq!(extracted.keywords.get("hello"), Some(&2));
    assert_eq!(extracted.keywords.get("world"), Some(&1));
    assert!(extracted.links.is_empty());

    // The page is a hit for "hello" with rel = 2 plus base authority.
    let terms = words::terms("hello", &filter());
    let keywords: HashMap<i64, HashMap<String, u64>> =
        [(1, extracted.keywords.clone())].into_iter().collect();
    let ranked = engine::rank(&terms, vec![page(1, "http://h/a")], &keywords, &[]);

    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].url, "http://h/a");
    assert_eq!(ranked[0].score, 2.0 + engine::BASE_AUTHORITY);
}

#[test]
fn two_page_chain_yields_both_edges() {
    let f = filter();

    let a = extractor::extract(
        &Url::parse("http://h/a").unwrap(),
        r#"<html><body>alpha <a href="/b">next</a></body></html>"#,
        &f,
    );
    let b = extractor::extract(
        &Url::parse("http://h/b").unwrap(),
        r#"<html><body>beta <a href="/a">back</a></body></html>"#,
        &f,
    );

    assert_eq!(a.links.len(), 1);
    assert_eq!(a.links[0].url, "http://h/b");
    assert_eq!(b.links.len(), 1);
    assert_eq!(b.links[0].url, "http://h/a");
}

#[test]
fn authority_reorders_pages_with_equal_keywords() {
    // Three pages carry "cat": A five times, B once, C ten times. C links
    // only to B, so B overtakes A on authority.
    let terms = words::terms("cat", &filter());
    assert_eq!(terms.get("cat"), Some(&1));

    let candidates = vec![
        page(1, "http://h/a"),
        page(2, "http://h/b"),
        page(3, "http://h/c"),
    ];
    let keywords: HashMap<i64, HashMap<String, u64>> = [
        (1, [("cat".to_string(), 5)].into_iter().collect()),
        (2, [("cat".to_string(), 1)].into_iter().collect()),
        (3, [("cat".to_string(), 10)].into_iter().collect()),
    ]
    .into_iter()
    .collect();
    let outlinks = vec![(3, "http://h/b".to_string())];

    let ranked = engine::rank(&terms, candidates, &keywords, &outlinks);

    let position = |url: &str| ranked.iter().position(|r| r.url == url).unwrap();
    assert!(position("http://h/b") < position("http://h/a"));

    let score = |url: &str| ranked[position(url)].score;
    // B: rel 1 + 0.85 * 10/1; A: rel 5 + base 1.0.
    assert_eq!(score("http://h/b"), 9.5);
    assert_eq!(score("http://h/a"), 6.0);
    assert!((score("http://h/b") - score("http://h/a") - 3.5).abs() < 1e-9);
}

#[test]
fn ranking_is_a_total_order() {
    let terms = words::terms("word", &filter());
    let candidates: Vec<PageRecord> = (1..=6)
        .map(|id| page(id, &format!("http://h/{id}")))
        .collect();
    let keywords: HashMap<i64, HashMap<String, u64>> = (1..=6)
        .map(|id| {
            let frequency = (id as u64 % 3) + 1;
            (id, [("word".to_string(), frequency)].into_iter().collect())
        })
        .collect();

    let ranked = engine::rank(&terms, candidates, &keywords, &[]);

    for pair in ranked.windows(2) {
        let ordered = pair[0].score > pair[1].score
            || (pair[0].score == pair[1].score && pair[0].id < pair[1].id);
        assert!(ordered, "ranking violated at {} / {}", pair[0].id, pair[1].id);
    }
}

#[test]
fn stop_word_query_produces_no_terms() {
    let terms = words::terms("the", &filter());
    assert!(terms.is_empty());

    let terms = words::terms("", &filter());
    assert!(terms.is_empty());
}

#[test]
fn filtered_tokens_never_reach_the_index() {
    let mut f = filter();
    f.min_frequency = 2;

    let base = Url::parse("http://h/a").unwrap();
    let body = "<html><body>kept kept solo the xy</body></html>";
    let extracted = extractor::extract(&base, body, &f);

    let indexed: HashSet<&str> = extracted.keywords.keys().map(String::as_str).collect();
    assert!(indexed.contains("kept"));
    assert!(!indexed.contains("solo"), "below the frequency floor");
    assert!(!indexed.contains("the"), "stop word");
}
