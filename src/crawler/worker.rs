//! The two worker loops of the crawl pipeline.
//!
//! Fetch workers pop URLs from the shared queue, apply the gating rules
//! (normalization, revisit window, politeness, robots) and download pages.
//! Processing workers take fetched bodies off an in-process channel,
//! extract, persist and enqueue the outlinks. Both loops swallow per-URL
//! errors; nothing a single page does can stop the crawl.

use crate::config::Config;
use crate::extractor;
use crate::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::models::CrawlEntry;
use crate::politeness::HostPoliteness;
use crate::queue::UrlQueue;
use crate::store::Store;
use crate::url_utils;
use crate::words::WordFilter;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

/// How long a fetched URL stays fresh before it may be crawled again.
pub const REVISIT_DELAY: Duration = Duration::from_secs(10 * 60);

/// Additional attempts after the first failed fetch.
pub const MAX_RETRIES: u32 = 3;

/// Fixed pause between retry attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pause when the queue is empty or a host is not yet ready.
const IDLE_PAUSE: Duration = Duration::from_millis(200);

/// Back-off after a queue error.
const QUEUE_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Shared handles threaded into every worker.
pub struct CrawlContext {
    pub config: Config,
    pub filter: WordFilter,
    pub queue: UrlQueue,
    /// Read-only store handle for revisit checks and counts.
    pub store: Arc<Store>,
    pub fetcher: Arc<Fetcher>,
    pub politeness: Arc<HostPoliteness>,
}

/// A fetched page travelling from the fetch pool to the processing pool.
pub struct FetchedWork {
    pub entry: CrawlEntry,
    /// The normalized URL the entry was popped as; pages are stored under it.
    pub url: Url,
    pub page: FetchedPage,
}

enum RevisitState {
    /// Not in the visited set.
    Unseen,
    /// Fetched within the revisit window.
    Fresh,
    /// In the visited set but the stored row is old enough to re-crawl.
    Stale,
    /// In the visited set with no stored row: a recent failed fetch.
    NegativeCache,
}

/// Fetch worker loop: pop, gate, fetch, hand off.
pub async fn run_fetch_worker(
    worker_id: usize,
    ctx: Arc<CrawlContext>,
    results: flume::Sender<FetchedWork>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let entry = match ctx.queue.pop().await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                sleep_or_shutdown(&mut shutdown, IDLE_PAUSE).await;
                continue;
            }
            Err(error) => {
                tracing::warn!(%error, "queue pop failed, backing off");
                sleep_or_shutdown(&mut shutdown, QUEUE_RETRY_PAUSE).await;
                continue;
            }
        };

        let Some(url) = url_utils::normalize(&entry.url) else {
            tracing::debug!(url = %entry.url, "dropping unparseable url");
            continue;
        };

        match revisit_state(&ctx, url.as_str()).await {
            RevisitState::Fresh | RevisitState::NegativeCache => continue,
            RevisitState::Stale => {
                if let Err(error) = ctx.queue.clear_visited(url.as_str()).await {
                    tracing::warn!(url = %url, %error, "failed to clear visited mark");
                }
            }
            RevisitState::Unseen => {}
        }

        let host = url_utils::extract_host(&url).unwrap_or_default();
        if !ctx.politeness.try_reserve(&host) {
            // Too soon for this host: back of the line, pick other work.
            if let Err(error) = ctx.queue.push(&entry).await {
                tracing::warn!(url = %url, %error, "failed to re-queue url");
            }
            sleep_or_shutdown(&mut shutdown, IDLE_PAUSE).await;
            continue;
        }

        if let Some(page) = fetch_with_retry(&ctx, &url, &host).await {
            if results
                .send_async(FetchedWork { entry, url, page })
                .await
                .is_err()
            {
                break;
            }
        }
    }

    tracing::debug!(worker_id, "fetch worker exiting");
}

/// Fetch with a bounded retry loop.
///
/// Timeouts, refused connections and 5xx statuses are retried with a fixed
/// delay; every attempt re-claims the host's politeness slot. 4xx statuses,
/// non-HTML bodies and exhausted retries negative-cache the URL. DNS
/// failures and robots denials drop it unmarked.
async fn fetch_with_retry(ctx: &CrawlContext, url: &Url, host: &str) -> Option<FetchedPage> {
    let mut attempt: u32 = 0;

    loop {
        match ctx.fetcher.fetch(url).await {
            Ok(page) => return Some(page),
            Err(error) if error.is_retryable() && attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    url = %url,
                    kind = error.kind(),
                    retry = attempt,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
                ctx.politeness.reserve(host).await;
            }
            Err(error @ (FetchError::Disallowed | FetchError::Dns)) => {
                tracing::debug!(url = %url, kind = error.kind(), retry = attempt, "dropping url");
                return None;
            }
            Err(error) => {
                tracing::warn!(
                    url = %url,
                    kind = error.kind(),
                    retry = attempt,
                    "giving up on url"
                );
                if let Err(queue_error) = ctx.queue.mark_visited(url.as_str()).await {
                    tracing::warn!(url = %url, error = %queue_error, "failed to mark url visited");
                }
                return None;
            }
        }
    }
}

async fn revisit_state(ctx: &CrawlContext, url: &str) -> RevisitState {
    match ctx.queue.is_visited(url).await {
        Ok(false) => RevisitState::Unseen,
        Err(error) => {
            tracing::warn!(url, %error, "visited check failed, treating as unseen");
            RevisitState::Unseen
        }
        Ok(true) => match ctx.store.last_crawled_at(url).await {
            Ok(Some(at)) => {
                let age = Utc::now().signed_duration_since(at);
                // A negative age means clock skew; count it as fresh.
                if age.to_std().map_or(true, |age| age < REVISIT_DELAY) {
                    RevisitState::Fresh
                } else {
                    RevisitState::Stale
                }
            }
            Ok(None) => RevisitState::NegativeCache,
            Err(error) => {
                tracing::warn!(url, %error, "revisit lookup failed, skipping url");
                RevisitState::Fresh
            }
        },
    }
}

/// Processing worker loop: extract, persist, enqueue outlinks.
///
/// Owns its store connection exclusively; each page is one transaction.
/// After a shutdown signal, remaining channel items are pushed back onto the
/// queue so the next run picks them up.
pub async fn run_processing_worker(
    worker_id: usize,
    ctx: Arc<CrawlContext>,
    mut store: Store,
    work: flume::Receiver<FetchedWork>,
    shutdown: watch::Receiver<bool>,
) {
    loop {
        let item = match work.recv_async().await {
            Ok(item) => item,
            Err(_) => break,
        };

        if *shutdown.borrow() {
            if let Err(error) = ctx.queue.push(&item.entry).await {
                tracing::warn!(url = %item.entry.url, %error, "failed to return url to queue");
            }
            continue;
        }

        process(&ctx, &mut store, item).await;
    }

    tracing::debug!(worker_id, "processing worker exiting");
}

async fn process(ctx: &CrawlContext, store: &mut Store, work: FetchedWork) {
    let FetchedWork { entry, url, page } = work;

    let extracted = extractor::extract(&page.final_url, &page.body, &ctx.filter);
    let keyword_count = extracted.keywords.len();
    let link_count = extracted.links.len();

    match store.persist_page(url.as_str(), &extracted).await {
        Ok(page_id) => {
            tracing::info!(
                url = %url,
                page_id,
                depth = entry.depth,
                keywords = keyword_count,
                links = link_count,
                "indexed page"
            );
        }
        Err(error) => {
            tracing::warn!(url = %url, %error, "failed to persist page, re-queueing");
            if let Err(queue_error) = ctx.queue.push(&entry).await {
                tracing::warn!(url = %url, error = %queue_error, "re-queue failed");
            }
            return;
        }
    }

    if let Err(error) = ctx.queue.mark_visited(url.as_str()).await {
        tracing::warn!(url = %url, %error, "failed to mark url visited");
    }

    enqueue_outlinks(ctx, &entry, extracted.links).await;
}

async fn enqueue_outlinks(ctx: &CrawlContext, entry: &CrawlEntry, links: Vec<extractor::Link>) {
    if ctx.config.exceeds_depth(entry.depth.saturating_add(1)) {
        tracing::debug!(url = %entry.url, depth = entry.depth, "outlinks beyond depth limit");
        return;
    }

    for link in links {
        let child = entry.child(link.url);
        if let Err(error) = ctx.queue.push(&child).await {
            tracing::warn!(url = %child.url, %error, "failed to enqueue outlink");
            return;
        }
    }
}

async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, duration: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}
