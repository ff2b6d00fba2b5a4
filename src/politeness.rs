//! Per-host politeness window shared by all fetch workers.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Tracks, per host, when the next request is allowed.
///
/// The map is written through entry-level locks; the critical section is a
/// compare-and-set on one `Instant`.
pub struct HostPoliteness {
    delay: Duration,
    ready_at: DashMap<String, Instant>,
}

impl HostPoliteness {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ready_at: DashMap::new(),
        }
    }

    /// Try to claim a fetch slot for `host` right now.
    ///
    /// Returns `false` when the host was contacted less than the configured
    /// delay ago; the caller should put the URL back and move on.
    pub fn try_reserve(&self, host: &str) -> bool {
        let now = Instant::now();
        let mut slot = self.ready_at.entry(host.to_string()).or_insert(now);

        if now < *slot {
            false
        } else {
            *slot = now + self.delay;
            true
        }
    }

    /// Claim a fetch slot for `host`, sleeping until one is available.
    /// Used by the retry path, where the URL is already ours.
    pub async fn reserve(&self, host: &str) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut slot = self.ready_at.entry(host.to_string()).or_insert(now);
                if now >= *slot {
                    *slot = now + self.delay;
                    return;
                }
                *slot - now
            };

            tokio::time::sleep(wait.min(Duration::from_millis(500))).await;
        }
    }
}
