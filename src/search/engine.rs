//! Query evaluation: term extraction, candidate retrieval and ranking.
//!
//! Ranking combines two signals: keyword relevance (a dot product of query
//! and page term frequencies) and a single damped authority pass over the
//! links between candidate pages. This is deliberately not iterative
//! PageRank; one pass over the candidate set is enough to let well-linked
//! pages climb without a fixpoint computation.

use crate::models::{PageRecord, RankedPage};
use crate::store::{Store, StoreError};
use crate::words::{self, WordFilter};
use std::collections::{HashMap, HashSet};

/// Damping applied to the summed backlink relevance.
pub const DAMPING_FACTOR: f64 = 0.85;

/// Authority of a page nothing in the candidate set links to.
pub const BASE_AUTHORITY: f64 = 1.0;

/// Run a search against the store. An empty or all-stop-word query returns
/// an empty list, not an error.
pub async fn search(
    store: &Store,
    filter: &WordFilter,
    query: &str,
) -> Result<Vec<RankedPage>, StoreError> {
    let terms = words::terms(query, filter);
    if terms.is_empty() {
        return Ok(Vec::new());
    }

    let term_list: Vec<String> = terms.keys().cloned().collect();
    let candidates = store.candidates_for(&term_list).await?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = candidates.iter().map(|page| page.id).collect();
    let keywords = store.keywords_for(&ids).await?;
    let outlinks = store.outlinks_for(&ids).await?;

    Ok(rank(&terms, candidates, &keywords, &outlinks))
}

/// Rank candidate pages.
///
/// `outlinks` holds every stored outbound edge of every candidate as
/// `(from_page_id, to_url)` pairs. Edges into the candidate set contribute
/// authority; each linking page counts once, weighted by its relevance over
/// its total out-degree. Results are ordered by descending score with
/// ascending page id as the tiebreak.
pub fn rank(
    terms: &HashMap<String, u64>,
    candidates: Vec<PageRecord>,
    keywords: &HashMap<i64, HashMap<String, u64>>,
    outlinks: &[(i64, String)],
) -> Vec<RankedPage> {
    let mut relevance: HashMap<i64, f64> = HashMap::new();
    for page in &candidates {
        let page_keywords = keywords.get(&page.id);
        let rel: f64 = terms
            .iter()
            .map(|(word, query_frequency)| {
                page_keywords
                    .and_then(|kw| kw.get(word))
                    .map_or(0.0, |page_frequency| {
                        (*query_frequency * *page_frequency) as f64
                    })
            })
            .sum();
        relevance.insert(page.id, rel);
    }

    let mut outdegree: HashMap<i64, u64> = HashMap::new();
    for (from, _) in outlinks {
        *outdegree.entry(*from).or_insert(0) += 1;
    }

    let mut inbound: HashMap<i64, HashSet<i64>> = HashMap::new();
    {
        let url_to_id: HashMap<&str, i64> = candidates
            .iter()
            .map(|page| (page.url.as_str(), page.id))
            .collect();
        for (from, to_url) in outlinks {
            if let Some(&to_id) = url_to_id.get(to_url.as_str()) {
                if to_id != *from {
                    inbound.entry(to_id).or_default().insert(*from);
                }
            }
        }
    }

    let mut ranked: Vec<RankedPage> = candidates
        .into_iter()
        .map(|page| {
            let rel = relevance.get(&page.id).copied().unwrap_or(0.0);
            let auth = match inbound.get(&page.id) {
                Some(sources) if !sources.is_empty() => {
                    DAMPING_FACTOR
                        * sources
                            .iter()
                            .map(|source| {
                                let degree =
                                    outdegree.get(source).copied().unwrap_or(1).max(1) as f64;
                                relevance.get(source).copied().unwrap_or(0.0) / degree
                            })
                            .sum::<f64>()
                }
                _ => BASE_AUTHORITY,
            };

            RankedPage {
                id: page.id,
                url: page.url,
                title: page.title,
                description: page.description,
                score: rel + auth,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn page(id: i64, url: &str) -> PageRecord {
        PageRecord {
            id,
            url: url.to_string(),
            title: None,
            description: None,
            last_crawled_at: Utc::now(),
        }
    }

    fn terms_of(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(w, f)| (w.to_string(), *f)).collect()
    }

    fn keywords_of(entries: &[(i64, &[(&str, u64)])]) -> HashMap<i64, HashMap<String, u64>> {
        entries
            .iter()
            .map(|(id, words)| (*id, terms_of(words)))
            .collect()
    }

    #[test]
    fn test_relevance_is_query_page_dot_product() {
        let terms = terms_of(&[("cat", 2)]);
        let keywords = keywords_of(&[(1, &[("cat", 3)])]);
        let ranked = rank(&terms, vec![page(1, "http://h/a")], &keywords, &[]);
        // rel = 2 * 3, auth = base 1.0
        assert_eq!(ranked[0].score, 7.0);
    }

    #[test]
    fn test_authority_from_backlinks_dominates() {
        // A carries "cat" 5 times; B only once but is linked by C which
        // carries it 10 times and has a single outlink.
        let terms = terms_of(&[("cat", 1)]);
        let candidates = vec![
            page(1, "http://h/a"),
            page(2, "http://h/b"),
            page(3, "http://h/c"),
        ];
        let keywords = keywords_of(&[
            (1, &[("cat", 5)]),
            (2, &[("cat", 1)]),
            (3, &[("cat", 10)]),
        ]);
        let outlinks = vec![(3, "http://h/b".to_string())];

        let ranked = rank(&terms, candidates, &keywords, &outlinks);

        let score_of = |url: &str| {
            ranked
                .iter()
                .find(|r| r.url == url)
                .map(|r| r.score)
                .unwrap()
        };
        // A: 5 + 1.0, B: 1 + 0.85 * 10/1, C: 10 + 1.0
        assert_eq!(score_of("http://h/a"), 6.0);
        assert_eq!(score_of("http://h/b"), 9.5);
        assert_eq!(score_of("http://h/c"), 11.0);

        let order: Vec<&str> = ranked.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(order, vec!["http://h/c", "http://h/b", "http://h/a"]);
    }

    #[test]
    fn test_authority_divides_by_total_outdegree() {
        let terms = terms_of(&[("cat", 1)]);
        let candidates = vec![page(1, "http://h/a"), page(2, "http://h/b")];
        let keywords = keywords_of(&[(1, &[("cat", 4)]), (2, &[("cat", 8)])]);
        // B links to A and to two pages outside the candidate set.
        let outlinks = vec![
            (2, "http://h/a".to_string()),
            (2, "http://x/1".to_string()),
            (2, "http://x/2".to_string()),
        ];

        let ranked = rank(&terms, candidates, &keywords, &outlinks);
        let a = ranked.iter().find(|r| r.id == 1).unwrap();
        // auth(A) = 0.85 * rel(B)/outdeg(B) = 0.85 * 8/3
        let expected = 4.0 + 0.85 * 8.0 / 3.0;
        assert!((a.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_scores_are_non_increasing_and_ties_break_by_id() {
        let terms = terms_of(&[("cat", 1)]);
        let candidates = vec![
            page(7, "http://h/x"),
            page(3, "http://h/y"),
            page(5, "http://h/z"),
        ];
        let keywords = keywords_of(&[
            (7, &[("cat", 2)]),
            (3, &[("cat", 2)]),
            (5, &[("cat", 9)]),
        ]);

        let ranked = rank(&terms, candidates, &keywords, &[]);

        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // Pages 7 and 3 tie; the lower id comes first.
        assert_eq!(ranked[1].id, 3);
        assert_eq!(ranked[2].id, 7);
    }

    #[test]
    fn test_self_links_grant_no_authority() {
        let terms = terms_of(&[("cat", 1)]);
        let candidates = vec![page(1, "http://h/a")];
        let keywords = keywords_of(&[(1, &[("cat", 2)])]);
        let outlinks = vec![(1, "http://h/a".to_string())];

        let ranked = rank(&terms, candidates, &keywords, &outlinks);
        // No inbound edges from other pages: base authority applies.
        assert_eq!(ranked[0].score, 2.0 + BASE_AUTHORITY);
    }
}
