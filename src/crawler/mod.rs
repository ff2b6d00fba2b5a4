//! Crawl supervisor: owns the worker pools, queue seeding and shutdown.

pub mod worker;

use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::models::CrawlEntry;
use crate::politeness::HostPoliteness;
use crate::queue::UrlQueue;
use crate::store::Store;
use crate::url_utils;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use worker::CrawlContext;

/// How long the queue must stay empty before a seed is considered.
const SEED_GRACE: Duration = Duration::from_secs(3);

/// Back-off between attempts while the queue service is unavailable.
const QUEUE_BACKOFF: Duration = Duration::from_secs(5);

/// How long in-flight workers get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Run the crawler until a shutdown signal arrives.
///
/// The store must be reachable at boot (fatal otherwise); the queue service
/// is retried indefinitely with a fixed back-off.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = Store::connect(&config.database_url).await?;
    store.ensure_schema().await?;
    let store = Arc::new(store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let queue = loop {
        if *shutdown_rx.borrow() {
            return Ok(());
        }
        match UrlQueue::connect(&config.queue_url).await {
            Ok(queue) => break queue,
            Err(error) => {
                tracing::warn!(%error, "queue unavailable, retrying");
                tokio::time::sleep(QUEUE_BACKOFF).await;
            }
        }
    };

    let fetcher = Arc::new(Fetcher::new(&config.user_agent, config.timeout())?);
    let politeness = Arc::new(HostPoliteness::new(config.delay()));
    let ctx = Arc::new(CrawlContext {
        filter: config.word_filter(),
        queue: queue.clone(),
        store: Arc::clone(&store),
        fetcher,
        politeness,
        config: config.clone(),
    });

    let crawling_workers = config.crawling_workers.max(1);
    let processing_workers = config.processing_workers.max(1);
    let (work_tx, work_rx) = flume::bounded(processing_workers * 2);

    let mut workers = JoinSet::new();
    for worker_id in 0..crawling_workers {
        workers.spawn(worker::run_fetch_worker(
            worker_id,
            Arc::clone(&ctx),
            work_tx.clone(),
            shutdown_rx.clone(),
        ));
    }
    // Processing workers stop when the last fetch worker drops its sender.
    drop(work_tx);

    for worker_id in 0..processing_workers {
        let worker_store = Store::connect(&config.database_url).await?;
        workers.spawn(worker::run_processing_worker(
            worker_id,
            Arc::clone(&ctx),
            worker_store,
            work_rx.clone(),
            shutdown_rx.clone(),
        ));
    }
    drop(work_rx);

    tracing::info!(
        crawling = crawling_workers,
        processing = processing_workers,
        "crawler started"
    );

    supervise(&ctx, shutdown_rx).await;

    tracing::info!("waiting for in-flight pages");
    let drain = async {
        while workers.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("shutdown grace period expired, aborting remaining workers");
        workers.shutdown().await;
    }

    tracing::info!("crawler stopped");
    Ok(())
}

/// Seeding loop: when the queue stays empty past the grace period and the
/// store holds no pages yet, push one randomly chosen seed URL.
async fn supervise(ctx: &CrawlContext, mut shutdown: watch::Receiver<bool>) {
    let mut empty_since: Option<Instant> = None;

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = shutdown.changed() => break,
        }

        match ctx.queue.len().await {
            Ok(0) => {
                let now = Instant::now();
                let since = *empty_since.get_or_insert(now);
                if now.duration_since(since) < SEED_GRACE {
                    continue;
                }

                match ctx.store.page_count().await {
                    Ok(0) => {
                        seed(ctx).await;
                        empty_since = None;
                    }
                    Ok(_) => {
                        // A corpus exists and nothing is pending: idle.
                    }
                    Err(error) => {
                        tracing::warn!(%error, "page count failed");
                    }
                }
            }
            Ok(_) => {
                empty_since = None;
            }
            Err(error) => {
                tracing::warn!(%error, "queue unavailable, backing off");
                tokio::time::sleep(QUEUE_BACKOFF).await;
            }
        }
    }
}

async fn seed(ctx: &CrawlContext) {
    let seeds = ctx.config.seeds();
    let Some(choice) = seeds.choose(&mut rand::thread_rng()) else {
        return;
    };
    let Some(url) = url_utils::normalize(choice) else {
        tracing::warn!(url = %choice, "ignoring unparseable seed url");
        return;
    };

    tracing::info!(url = %url, "seeding empty queue");
    if let Err(error) = ctx.queue.push(&CrawlEntry::seed(url.as_str())).await {
        tracing::warn!(%error, "failed to push seed url");
    }
}

/// Resolves when SIGINT or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
