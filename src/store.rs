//! PostgreSQL store: schema management, page persistence and search reads.

use crate::extractor::ExtractedPage;
use crate::models::PageRecord;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio_postgres::NoTls;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pages (
    id              BIGSERIAL PRIMARY KEY,
    url             TEXT NOT NULL UNIQUE,
    title           TEXT,
    description     TEXT,
    last_crawled_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS keywords (
    page_id   BIGINT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    word      TEXT NOT NULL,
    frequency BIGINT NOT NULL,
    UNIQUE (page_id, word)
);

CREATE TABLE IF NOT EXISTS forward_links (
    from_page_id BIGINT NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    to_url       TEXT NOT NULL,
    frequency    BIGINT NOT NULL,
    UNIQUE (from_page_id, to_url)
);

CREATE INDEX IF NOT EXISTS idx_pages_title ON pages (title);
CREATE INDEX IF NOT EXISTS idx_pages_description ON pages (description);
CREATE INDEX IF NOT EXISTS idx_keywords_word ON keywords (word);
CREATE INDEX IF NOT EXISTS idx_forward_links_from ON forward_links (from_page_id);
";

/// One Postgres connection.
///
/// Crawl workers each own a `Store` exclusively (per-page transactions need
/// it); the search API shares a single one, since reads are pipelined and
/// only borrow immutably.
pub struct Store {
    client: tokio_postgres::Client,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;

        // The connection task drives the socket until the client is dropped.
        tokio::spawn(async move {
            if let Err(error) = connection.await {
                tracing::error!(%error, "postgres connection error");
            }
        });

        Ok(Self { client })
    }

    /// Apply the schema. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    pub async fn page_count(&self) -> Result<i64, StoreError> {
        let row = self.client.query_one("SELECT COUNT(*) FROM pages", &[]).await?;
        Ok(row.get(0))
    }

    pub async fn last_crawled_at(&self, url: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = self
            .client
            .query_opt("SELECT last_crawled_at FROM pages WHERE url = $1", &[&url])
            .await?;
        Ok(row.map(|row| row.get(0)))
    }

    /// Persist one crawled page atomically.
    ///
    /// Upserts the page row by URL, then replaces all of its keyword and
    /// forward-link rows inside the same transaction, so a re-crawl never
    /// leaves a mix of old and new index entries behind.
    pub async fn persist_page(&mut self, url: &str, page: &ExtractedPage) -> Result<i64, StoreError> {
        let tx = self.client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO pages (url, title, description, last_crawled_at) \
                 VALUES ($1, $2, $3, now()) \
                 ON CONFLICT (url) DO UPDATE SET \
                     title = EXCLUDED.title, \
                     description = EXCLUDED.description, \
                     last_crawled_at = now() \
                 RETURNING id",
                &[&url, &page.title, &page.description],
            )
            .await?;
        let page_id: i64 = row.get(0);

        tx.execute("DELETE FROM keywords WHERE page_id = $1", &[&page_id])
            .await?;
        let insert_keyword = tx
            .prepare("INSERT INTO keywords (page_id, word, frequency) VALUES ($1, $2, $3)")
            .await?;
        for (word, frequency) in &page.keywords {
            tx.execute(&insert_keyword, &[&page_id, word, &(*frequency as i64)])
                .await?;
        }

        tx.execute("DELETE FROM forward_links WHERE from_page_id = $1", &[&page_id])
            .await?;
        let insert_link = tx
            .prepare("INSERT INTO forward_links (from_page_id, to_url, frequency) VALUES ($1, $2, $3)")
            .await?;
        for link in &page.links {
            if link.url == url {
                continue;
            }
            tx.execute(&insert_link, &[&page_id, &link.url, &(link.frequency as i64)])
                .await?;
        }

        tx.commit().await?;
        Ok(page_id)
    }

    /// Distinct pages having at least one keyword among `terms`.
    pub async fn candidates_for(&self, terms: &[String]) -> Result<Vec<PageRecord>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT DISTINCT p.id, p.url, p.title, p.description, p.last_crawled_at \
                 FROM pages p \
                 JOIN keywords k ON k.page_id = p.id \
                 WHERE k.word = ANY($1)",
                &[&terms],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| PageRecord {
                id: row.get(0),
                url: row.get(1),
                title: row.get(2),
                description: row.get(3),
                last_crawled_at: row.get(4),
            })
            .collect())
    }

    /// Full keyword maps for a set of pages.
    pub async fn keywords_for(
        &self,
        page_ids: &[i64],
    ) -> Result<HashMap<i64, HashMap<String, u64>>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT page_id, word, frequency FROM keywords WHERE page_id = ANY($1)",
                &[&page_ids],
            )
            .await?;

        let mut keywords: HashMap<i64, HashMap<String, u64>> = HashMap::new();
        for row in rows {
            let page_id: i64 = row.get(0);
            let word: String = row.get(1);
            let frequency: i64 = row.get(2);
            keywords
                .entry(page_id)
                .or_default()
                .insert(word, frequency.max(0) as u64);
        }
        Ok(keywords)
    }

    /// Every outbound edge of the given pages, as (from_page_id, to_url).
    pub async fn outlinks_for(&self, page_ids: &[i64]) -> Result<Vec<(i64, String)>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT from_page_id, to_url FROM forward_links WHERE from_page_id = ANY($1)",
                &[&page_ids],
            )
            .await?;

        Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
    }
}
