//! Process configuration, read once at startup from the environment.

use crate::words::WordFilter;
use clap::Args;
use std::collections::HashSet;
use std::time::Duration;

/// All runtime options. Each field is backed by one environment variable
/// (overridable by a flag in development) and read exactly once at startup;
/// the struct is then threaded through constructors immutably.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Store connection string (postgres://...).
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Queue service connection string (redis://...).
    #[arg(long, env = "QUEUE_URL")]
    pub queue_url: String,

    /// Comma-separated seed URLs, used only when the queue and store are empty.
    #[arg(long, env = "SEED_URLS", default_value = "")]
    pub seed_urls: String,

    /// Comma-separated stop-word list.
    #[arg(long, env = "STOP_WORDS", default_value = "")]
    pub stop_words: String,

    /// Concurrent fetch workers.
    #[arg(long, env = "CRAWLING_WORKERS", default_value_t = 1)]
    pub crawling_workers: usize,

    /// Concurrent extract-and-persist workers.
    #[arg(long, env = "PROCESSING_WORKERS", default_value_t = 1)]
    pub processing_workers: usize,

    /// Minimum gap between two fetches to the same host, in seconds.
    #[arg(long, env = "CRAWL_DELAY", default_value_t = 1)]
    pub crawl_delay: u64,

    /// Maximum crawl depth; -1 means unbounded.
    #[arg(
        long,
        env = "MAXIMUM_DEPTH",
        default_value_t = -1,
        allow_negative_numbers = true
    )]
    pub maximum_depth: i32,

    /// Words appearing fewer times than this on a page are not indexed.
    #[arg(long, env = "MINIMUM_WORD_FREQUENCY", default_value_t = 1)]
    pub minimum_word_frequency: u64,

    /// Per-page word frequencies are clamped to this ceiling.
    #[arg(long, env = "MAXIMUM_WORD_FREQUENCY", default_value_t = 1024)]
    pub maximum_word_frequency: u64,

    /// Tokens shorter than this are not indexed.
    #[arg(long, env = "MINIMUM_WORD_LENGTH", default_value_t = 2)]
    pub minimum_word_length: usize,

    /// Tokens longer than this are not indexed.
    #[arg(long, env = "MAXIMUM_WORD_LENGTH", default_value_t = 128)]
    pub maximum_word_length: usize,

    /// User-Agent header sent with every request.
    #[arg(long, env = "USER_AGENT", default_value = "RSE/1.0.0")]
    pub user_agent: String,

    /// Per-request timeout, in seconds.
    #[arg(long, env = "HTTP_TIMEOUT", default_value_t = 10)]
    pub http_timeout: u64,

    /// Search API bind address.
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    pub listen_address: String,
}

impl Config {
    /// Seed URLs as a list, empty entries removed.
    pub fn seeds(&self) -> Vec<String> {
        split_csv(&self.seed_urls)
    }

    /// Stop words as a lowercased set.
    pub fn stop_word_set(&self) -> HashSet<String> {
        split_csv(&self.stop_words)
            .into_iter()
            .map(|word| word.to_lowercase())
            .collect()
    }

    /// The keyword filter derived from the word bounds and stop words.
    pub fn word_filter(&self) -> WordFilter {
        WordFilter {
            stop_words: self.stop_word_set(),
            min_length: self.minimum_word_length,
            max_length: self.maximum_word_length,
            min_frequency: self.minimum_word_frequency,
            max_frequency: self.maximum_word_frequency,
        }
    }

    /// Per-host politeness delay.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.crawl_delay)
    }

    /// Per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    /// Whether `depth` is beyond the configured crawl horizon.
    pub fn exceeds_depth(&self, depth: i32) -> bool {
        self.maximum_depth >= 0 && depth > self.maximum_depth
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["rse", "--database-url", "postgres://db", "--queue-url", "redis://q"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).config
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.crawling_workers, 1);
        assert_eq!(config.processing_workers, 1);
        assert_eq!(config.crawl_delay, 1);
        assert_eq!(config.maximum_depth, -1);
        assert_eq!(config.minimum_word_frequency, 1);
        assert_eq!(config.maximum_word_frequency, 1024);
        assert_eq!(config.minimum_word_length, 2);
        assert_eq!(config.maximum_word_length, 128);
        assert_eq!(config.user_agent, "RSE/1.0.0");
        assert_eq!(config.http_timeout, 10);
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert!(config.seeds().is_empty());
        assert!(config.stop_word_set().is_empty());
    }

    #[test]
    fn test_csv_lists_are_trimmed_and_lowercased() {
        let config = parse(&[
            "--seed-urls",
            "http://a/, http://b/ ,,",
            "--stop-words",
            "The, AND ,or",
        ]);
        assert_eq!(config.seeds(), vec!["http://a/", "http://b/"]);
        let stops = config.stop_word_set();
        assert!(stops.contains("the"));
        assert!(stops.contains("and"));
        assert!(stops.contains("or"));
        assert_eq!(stops.len(), 3);
    }

    #[test]
    fn test_depth_bound() {
        let unbounded = parse(&[]);
        assert!(!unbounded.exceeds_depth(10_000));

        let bounded = parse(&["--maximum-depth", "1"]);
        assert!(!bounded.exceeds_depth(0));
        assert!(!bounded.exceeds_depth(1));
        assert!(bounded.exceeds_depth(2));
    }
}
