//! robots.txt fetching, per-host caching and allow decisions.

use crate::url_utils;
use dashmap::DashMap;
use robotstxt::DefaultMatcher;
use url::Url;

/// Per-host robots.txt cache.
///
/// Rules are fetched once per host and kept for the process lifetime. An
/// unreachable or non-200 robots.txt is recorded as absent, which is
/// permissive: the host is crawlable until it says otherwise.
pub struct RobotsCache {
    client: reqwest::Client,
    user_agent: String,
    rules: DashMap<String, Option<String>>,
}

impl RobotsCache {
    pub fn new(client: reqwest::Client, user_agent: String) -> Self {
        Self {
            client,
            user_agent,
            rules: DashMap::new(),
        }
    }

    /// Whether the configured agent may fetch `url`.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = url_utils::extract_host(url) else {
            return true;
        };
        let key = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };

        if !self.rules.contains_key(&key) {
            let fetched = self.fetch_rules(url).await;
            tracing::debug!(
                host = %key,
                found = fetched.is_some(),
                "cached robots.txt rules"
            );
            self.rules.insert(key.clone(), fetched);
        }

        match self.rules.get(&key) {
            Some(entry) => allowed(entry.value().as_deref(), &self.user_agent, url.as_str()),
            None => true,
        }
    }

    async fn fetch_rules(&self, url: &Url) -> Option<String> {
        let robots_url = url_utils::robots_url(url)?;
        let response = self.client.get(robots_url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

/// Decide whether `url` is allowed under a robots.txt body. The matcher
/// resolves the group for `user_agent`, falling back to `*`; a missing body
/// is permissive.
pub fn allowed(rules: Option<&str>, user_agent: &str, url: &str) -> bool {
    match rules {
        Some(body) => {
            let mut matcher = DefaultMatcher::default();
            matcher.one_agent_allowed_by_robots(body, user_agent, url)
        }
        None => true,
    }
}
