//! Crawler configuration
//!
//! Covers the lifecycle knobs (enabled flag, worker count, debug mode,
//! inter-task delay) and the parameters of the reference stage chain.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Queue channel the crawler pops task ids from by default
pub const DEFAULT_FETCH_CHANNEL: &str = "fetch";

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// Enabled crawler with no workers
    #[error("worker_count must be at least 1 when the crawler is enabled")]
    ZeroWorkers,

    /// A disallowed pattern failed to compile
    #[error("invalid disallowed pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Environment variable present but unparsable
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Whether the crawler spawns any workers at all
    pub enabled: bool,

    /// Number of workers in the pool
    pub worker_count: usize,

    /// Debug mode: stage panics are re-raised instead of contained
    pub debug: bool,

    /// Pause between two tasks on the same worker (zero disables throttling)
    #[serde(with = "duration_millis")]
    pub fetch_delay_threshold: Duration,

    /// Queue channel task ids are popped from and links are dispatched to
    pub fetch_channel: String,

    /// Wait after a queue error before popping again
    #[serde(with = "duration_millis")]
    pub queue_error_backoff: Duration,

    /// Treat subdomains of a site as part of the same crawl scope
    pub follow_sub_domain: bool,

    /// Drop URLs that have timed out at least this many times
    pub ignore_timeout_after_count: u32,

    /// Push newly discovered links back into the queue
    pub dispatch_links: bool,

    /// Maximum depth of dispatched links (seeds are depth 0)
    pub max_depth: u32,

    /// Gzip page bodies before persisting them
    pub compress_body: bool,

    /// Longest URL accepted by the filter stage
    pub max_url_length: usize,

    /// Regex patterns of URLs that are never crawled
    pub disallowed_patterns: Vec<String>,

    /// Skip pages fetched successfully more recently than this
    #[serde(with = "duration_millis")]
    pub revisit_after: Duration,

    /// HTTP request timeout
    #[serde(with = "duration_millis")]
    pub fetch_timeout: Duration,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_count: 4,
            debug: false,
            fetch_delay_threshold: Duration::ZERO,
            fetch_channel: DEFAULT_FETCH_CHANNEL.to_string(),
            queue_error_backoff: Duration::from_secs(1),
            follow_sub_domain: true,
            ignore_timeout_after_count: 100,
            dispatch_links: true,
            max_depth: 3,
            compress_body: true,
            max_url_length: 2048,
            disallowed_patterns: vec![],
            revisit_after: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(30),
            user_agent: concat!("crawler/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables (all optional):
    /// - `CRAWLER_ENABLED`: "true"/"false"
    /// - `CRAWLER_WORKERS`: worker count
    /// - `CRAWLER_DEBUG`: "true"/"false"
    /// - `CRAWLER_FETCH_DELAY_MS`: delay between tasks on one worker
    /// - `CRAWLER_FETCH_CHANNEL`: queue channel name
    /// - `CRAWLER_FOLLOW_SUBDOMAIN`: "true"/"false"
    /// - `CRAWLER_IGNORE_TIMEOUT_AFTER`: timeout-failure threshold
    /// - `CRAWLER_DISPATCH_LINKS`: "true"/"false"
    /// - `CRAWLER_MAX_DEPTH`: maximum link depth
    /// - `CRAWLER_COMPRESS_BODY`: "true"/"false"
    /// - `CRAWLER_FETCH_TIMEOUT_MS`: HTTP timeout
    /// - `CRAWLER_USER_AGENT`: user agent
    /// - `CRAWLER_DISALLOWED`: comma separated regex patterns
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "CRAWLER_ENABLED")? {
            config.enabled = v;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_WORKERS")? {
            config.worker_count = v;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_DEBUG")? {
            config.debug = v;
        }
        if let Some(ms) = parse_var(&lookup, "CRAWLER_FETCH_DELAY_MS")? {
            config.fetch_delay_threshold = Duration::from_millis(ms);
        }
        if let Some(channel) = lookup("CRAWLER_FETCH_CHANNEL") {
            config.fetch_channel = channel;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_FOLLOW_SUBDOMAIN")? {
            config.follow_sub_domain = v;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_IGNORE_TIMEOUT_AFTER")? {
            config.ignore_timeout_after_count = v;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_DISPATCH_LINKS")? {
            config.dispatch_links = v;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_MAX_DEPTH")? {
            config.max_depth = v;
        }
        if let Some(v) = parse_var(&lookup, "CRAWLER_COMPRESS_BODY")? {
            config.compress_body = v;
        }
        if let Some(ms) = parse_var(&lookup, "CRAWLER_FETCH_TIMEOUT_MS")? {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(agent) = lookup("CRAWLER_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(patterns) = lookup("CRAWLER_DISALLOWED") {
            config.disallowed_patterns = patterns
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the crawler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        for pattern in &self.disallowed_patterns {
            regex::Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Enable or disable the crawler
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the worker count
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set debug mode
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the delay between tasks on one worker
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay_threshold = delay;
        self
    }

    /// Set the queue channel
    pub fn with_fetch_channel(mut self, channel: impl Into<String>) -> Self {
        self.fetch_channel = channel.into();
        self
    }

    /// Set subdomain following
    pub fn with_follow_sub_domain(mut self, follow: bool) -> Self {
        self.follow_sub_domain = follow;
        self
    }

    /// Set the timeout-failure threshold
    pub fn with_ignore_timeout_after(mut self, count: u32) -> Self {
        self.ignore_timeout_after_count = count;
        self
    }

    /// Set link dispatching and the maximum depth
    pub fn with_dispatch(mut self, dispatch_links: bool, max_depth: u32) -> Self {
        self.dispatch_links = dispatch_links;
        self.max_depth = max_depth;
        self
    }

    /// Set body compression
    pub fn with_compress_body(mut self, compress: bool) -> Self {
        self.compress_body = compress;
        self
    }

    /// Add a disallowed URL pattern
    pub fn with_disallowed_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.disallowed_patterns.push(pattern.into());
        self
    }

    /// Set the revisit interval
    pub fn with_revisit_after(mut self, interval: Duration) -> Self {
        self.revisit_after = interval;
        self
    }

    /// Set the HTTP timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
