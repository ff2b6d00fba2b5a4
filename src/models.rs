//! Shared data types for the crawl pipeline and the search service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of crawl work, serialized into the queue as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlEntry {
    pub url: String,
    pub depth: i32,
}

impl CrawlEntry {
    /// Entry for a seed URL (depth 0).
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
        }
    }

    /// Entry for an outlink discovered on this page, one level deeper.
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: self.depth.saturating_add(1),
        }
    }
}

/// A row from the `pages` table.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub last_crawled_at: DateTime<Utc>,
}

/// A page paired with its final search score.
#[derive(Debug, Clone)]
pub struct RankedPage {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_entry_round_trips_through_json() {
        let entry = CrawlEntry {
            url: "https://example.com/".to_string(),
            depth: 3,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: CrawlEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }

    #[test]
    fn test_child_increments_depth() {
        let seed = CrawlEntry::seed("https://example.com/");
        assert_eq!(seed.depth, 0);
        let child = seed.child("https://example.com/about");
        assert_eq!(child.depth, 1);
    }
}
