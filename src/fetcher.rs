//! HTTP fetching with robots.txt consultation and error classification.

use crate::robots::RobotsCache;
use crate::url_utils;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Hard cap on buffered response bodies.
pub const MAX_CONTENT_SIZE: usize = 8 * 1024 * 1024;

/// Redirect chains longer than this are abandoned.
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    /// The URL after following redirects; relative links resolve against it.
    pub final_url: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("DNS resolution failed")]
    Dns,

    #[error("request timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("disallowed by robots.txt")]
    Disallowed,

    #[error("not HTML: {0}")]
    NotHtml(String),

    #[error("content too large: {0} bytes (max {MAX_CONTENT_SIZE})")]
    ContentTooLarge(usize),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl FetchError {
    /// Errors worth another attempt: timeouts, refused connections and
    /// server-side failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Refused => true,
            FetchError::Http(status) => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Short machine-readable kind for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Dns => "fetch_dns",
            FetchError::Timeout => "fetch_timeout",
            FetchError::Refused => "fetch_refused",
            FetchError::Http(_) => "fetch_http",
            FetchError::Disallowed => "fetch_disallowed",
            FetchError::NotHtml(_) => "fetch_not_html",
            FetchError::ContentTooLarge(_) => "fetch_too_large",
            FetchError::Network(_) => "fetch_network",
            FetchError::ClientBuild(_) => "client_build",
        }
    }

    /// Convert reqwest::Error into FetchError, sniffing the source chain for
    /// DNS failures the way the connect error flattens them.
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return FetchError::Timeout;
        }
        if error.is_redirect() {
            return FetchError::Network(format!("redirect limit ({MAX_REDIRECTS}) exceeded"));
        }

        let mut message = error.to_string().to_lowercase();
        let mut source = std::error::Error::source(&error);
        while let Some(inner) = source {
            message.push(' ');
            message.push_str(&inner.to_string().to_lowercase());
            source = inner.source();
        }

        if message.contains("dns")
            || message.contains("name resolution")
            || message.contains("no such host")
        {
            return FetchError::Dns;
        }
        if error.is_connect() {
            return FetchError::Refused;
        }

        FetchError::Network(message)
    }
}

/// HTTP client wrapper enforcing the crawl contract: fixed user-agent, one
/// absolute timeout per request, bounded redirects and robots compliance.
pub struct Fetcher {
    client: reqwest::Client,
    robots: Arc<RobotsCache>,
}

impl Fetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        let robots = Arc::new(RobotsCache::new(client.clone(), user_agent.to_string()));

        Ok(Self { client, robots })
    }

    /// Fetch one page.
    ///
    /// Consults the cached robots.txt rules for the host first; the request
    /// is only sent when allowed. Non-2xx statuses (after redirects) are
    /// errors with the status preserved. Bodies that are not HTML or exceed
    /// the size cap are rejected without being indexed.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if !self.robots.is_allowed(url).await {
            return Err(FetchError::Disallowed);
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.is_empty() && !url_utils::is_html_content_type(&content_type) {
            return Err(FetchError::NotHtml(content_type));
        }

        if let Some(length) = response.content_length() {
            if length as usize > MAX_CONTENT_SIZE {
                return Err(FetchError::ContentTooLarge(length as usize));
            }
        }

        let final_url = response.url().clone();
        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        if bytes.len() > MAX_CONTENT_SIZE {
            return Err(FetchError::ContentTooLarge(bytes.len()));
        }

        Ok(FetchedPage {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
            final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fetcher() {
        let fetcher = Fetcher::new("RSE/1.0.0", Duration::from_secs(10));
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Refused.is_retryable());
        assert!(FetchError::Http(500).is_retryable());
        assert!(FetchError::Http(503).is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!FetchError::Http(404).is_retryable());
        assert!(!FetchError::Http(403).is_retryable());
        assert!(!FetchError::Dns.is_retryable());
        assert!(!FetchError::Disallowed.is_retryable());
        assert!(!FetchError::NotHtml("image/png".into()).is_retryable());
    }
}
