//! Per-task context threaded through every stage of one pipeline run

use std::sync::Arc;

use url::Url;

use super::stage::StageError;
use crate::config::CrawlerConfig;
use crate::env::CrawlerEnv;
use crate::fetch::FetchedPage;
use crate::persistence::CrawlRecord;
use crate::stages::SiteScope;

/// Mutable state bag for one task
///
/// Created fresh for every task and owned by exactly one pipeline run.
/// Earlier stages fill the optional slots, later stages read them through
/// the `require_*` accessors, which fail the run if a slot is still empty.
#[derive(Debug)]
pub struct Context {
    task_id: String,
    env: Arc<CrawlerEnv>,

    /// Task id interpreted as a URL, before normalization
    pub raw_url: Option<String>,

    /// Normalized URL
    pub url: Option<Url>,

    /// Hosts links must belong to in order to be dispatched
    pub site: Option<SiteScope>,

    /// Crawl metadata for `url`
    pub record: Option<CrawlRecord>,

    /// Fetch response
    pub page: Option<FetchedPage>,

    /// Outgoing links, absolute and deduplicated
    pub links: Vec<String>,

    /// How many links were pushed back into the queue
    pub dispatched: usize,

    /// Id of the persisted document
    pub document_id: Option<String>,
}

impl Context {
    /// Create a context for `task_id`
    pub fn new(task_id: impl Into<String>, env: Arc<CrawlerEnv>) -> Self {
        Self {
            task_id: task_id.into(),
            env,
            raw_url: None,
            url: None,
            site: None,
            record: None,
            page: None,
            links: Vec::new(),
            dispatched: 0,
            document_id: None,
        }
    }

    /// Task id as received from the queue
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Shared environment
    pub fn env(&self) -> &CrawlerEnv {
        &self.env
    }

    /// Shorthand for the environment's configuration
    pub fn config(&self) -> &CrawlerConfig {
        &self.env.config
    }

    pub fn require_raw_url(&self) -> Result<&str, StageError> {
        self.raw_url
            .as_deref()
            .ok_or(StageError::MissingState("raw_url"))
    }

    pub fn require_url(&self) -> Result<&Url, StageError> {
        self.url.as_ref().ok_or(StageError::MissingState("url"))
    }

    pub fn require_record(&self) -> Result<&CrawlRecord, StageError> {
        self.record.as_ref().ok_or(StageError::MissingState("record"))
    }

    pub fn require_record_mut(&mut self) -> Result<&mut CrawlRecord, StageError> {
        self.record.as_mut().ok_or(StageError::MissingState("record"))
    }

    pub fn require_page(&self) -> Result<&FetchedPage, StageError> {
        self.page.as_ref().ok_or(StageError::MissingState("page"))
    }
}
