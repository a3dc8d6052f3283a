//! MetadataStore and PageStore trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error type for store operations
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Crawl status of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    /// Known but never fetched
    New,

    /// Fetched and persisted
    Fetched,

    /// Server answered with a non-success status
    HttpError,

    /// Last fetch attempt failed
    Failed,
}

/// Per-URL crawl metadata carried across tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// Normalized URL (the record key)
    pub url: String,

    /// Link distance from a seed URL
    pub depth: u32,

    /// Current status
    pub status: CrawlStatus,

    /// Consecutive fetch timeouts
    pub timeout_failures: u32,

    /// Last HTTP status seen
    pub http_status: Option<u16>,

    /// When the page was last fetched successfully
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl CrawlRecord {
    /// Create a record for a URL that has never been fetched
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            status: CrawlStatus::New,
            timeout_failures: 0,
            http_status: None,
            last_fetched_at: None,
        }
    }
}

/// A fetched page ready to be stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPage {
    /// Task id that produced the page
    pub task_id: String,

    /// Normalized URL
    pub url: String,

    /// HTTP status
    pub status: u16,

    /// Content type header, if any
    pub content_type: Option<String>,

    /// Body bytes (gzip when `compressed`)
    pub body: Vec<u8>,

    /// Whether `body` is gzip compressed
    pub compressed: bool,

    /// Outgoing links found on the page
    pub links: Vec<String>,

    /// Fetch timestamp
    pub fetched_at: DateTime<Utc>,
}

/// Storage for per-URL crawl metadata
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up the record for `url`
    async fn get(&self, url: &str) -> Result<Option<CrawlRecord>, StoreError>;

    /// Insert or replace a record
    async fn put(&self, record: CrawlRecord) -> Result<(), StoreError>;

    /// Insert a record unless one exists; returns whether it was inserted
    async fn insert_if_absent(&self, record: CrawlRecord) -> Result<bool, StoreError>;

    /// Forget the record for `url`; returns whether one existed
    async fn remove(&self, url: &str) -> Result<bool, StoreError>;
}

/// Storage for crawled pages
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Persist a page and return its document id
    async fn save(&self, page: StoredPage) -> Result<String, StoreError>;
}
