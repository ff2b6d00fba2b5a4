//! Redis-backed crawl frontier: the pending URL queue and the visited set.
//!
//! Both structures are durable across crawler restarts. The queue tolerates
//! duplicate entries; deduplication happens on the pop side via the visited
//! set and the store's revisit window.

use crate::models::CrawlEntry;
use redis::aio::MultiplexedConnection;

/// Redis key holding the FIFO of pending crawl entries.
pub const URL_QUEUE_KEY: &str = "url_queue";
/// Redis key holding the set of recently fetched URLs.
pub const VISITED_SET_KEY: &str = "visited_urls";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue unavailable: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Handle to the shared queue service. Cloning is cheap; every worker holds
/// its own copy of the multiplexed connection.
#[derive(Clone)]
pub struct UrlQueue {
    conn: MultiplexedConnection,
}

impl UrlQueue {
    pub async fn connect(queue_url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(queue_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    /// Push an entry onto the queue tail.
    pub async fn push(&self, entry: &CrawlEntry) -> Result<(), QueueError> {
        let payload = match serde_json::to_string(entry) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(url = %entry.url, %error, "failed to encode queue entry");
                return Ok(());
            }
        };

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("LPUSH")
            .arg(URL_QUEUE_KEY)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Pop the oldest entry, skipping over malformed payloads.
    pub async fn pop(&self) -> Result<Option<CrawlEntry>, QueueError> {
        let mut conn = self.conn.clone();

        loop {
            let payload: Option<String> = redis::cmd("RPOP")
                .arg(URL_QUEUE_KEY)
                .query_async(&mut conn)
                .await?;

            let Some(payload) = payload else {
                return Ok(None);
            };

            match serde_json::from_str(&payload) {
                Ok(entry) => return Ok(Some(entry)),
                Err(error) => {
                    tracing::warn!(%error, "dropping malformed queue entry");
                }
            }
        }
    }

    /// Number of pending entries.
    pub async fn len(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let length: u64 = redis::cmd("LLEN")
            .arg(URL_QUEUE_KEY)
            .query_async(&mut conn)
            .await?;
        Ok(length)
    }

    /// Record that `url` was fetched (or negatively cached).
    pub async fn mark_visited(&self, url: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SADD")
            .arg(VISITED_SET_KEY)
            .arg(url)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Whether `url` is in the visited set.
    pub async fn is_visited(&self, url: &str) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let member: bool = redis::cmd("SISMEMBER")
            .arg(VISITED_SET_KEY)
            .arg(url)
            .query_async(&mut conn)
            .await?;
        Ok(member)
    }

    /// Remove `url` from the visited set (its revisit window expired).
    pub async fn clear_visited(&self, url: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SREM")
            .arg(VISITED_SET_KEY)
            .arg(url)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
