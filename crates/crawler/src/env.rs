//! Runtime environment shared by the module, workers and stages

use std::sync::Arc;

use crate::config::CrawlerConfig;
use crate::events::{BroadcastPublisher, EventPublisher};
use crate::fetch::Fetcher;
use crate::persistence::{InMemoryMetadataStore, InMemoryPageStore, MetadataStore, PageStore};
use crate::queue::{InMemoryTaskQueue, TaskQueue};

/// Configuration plus the collaborators stages talk to
///
/// Read-only once built; every pipeline run holds an `Arc` to it.
#[derive(Clone)]
pub struct CrawlerEnv {
    pub config: CrawlerConfig,
    pub queue: Arc<dyn TaskQueue>,
    pub metadata: Arc<dyn MetadataStore>,
    pub pages: Arc<dyn PageStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub events: Arc<dyn EventPublisher>,
}

impl CrawlerEnv {
    /// Start building an environment around `config` and `fetcher`
    ///
    /// Collaborators that are not set explicitly default to in-memory ones.
    pub fn builder(config: CrawlerConfig, fetcher: Arc<dyn Fetcher>) -> CrawlerEnvBuilder {
        CrawlerEnvBuilder {
            config,
            fetcher,
            queue: None,
            metadata: None,
            pages: None,
            events: None,
        }
    }
}

impl std::fmt::Debug for CrawlerEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlerEnv")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CrawlerEnv`]
pub struct CrawlerEnvBuilder {
    config: CrawlerConfig,
    fetcher: Arc<dyn Fetcher>,
    queue: Option<Arc<dyn TaskQueue>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    pages: Option<Arc<dyn PageStore>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl CrawlerEnvBuilder {
    /// Set the task queue
    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Set the metadata store
    pub fn with_metadata(mut self, metadata: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the page store
    pub fn with_pages(mut self, pages: Arc<dyn PageStore>) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Set the event publisher
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Finish the environment
    pub fn build(self) -> Arc<CrawlerEnv> {
        Arc::new(CrawlerEnv {
            config: self.config,
            fetcher: self.fetcher,
            queue: self
                .queue
                .unwrap_or_else(|| Arc::new(InMemoryTaskQueue::new())),
            metadata: self
                .metadata
                .unwrap_or_else(|| Arc::new(InMemoryMetadataStore::new())),
            pages: self.pages.unwrap_or_else(|| Arc::new(InMemoryPageStore::new())),
            events: self
                .events
                .unwrap_or_else(|| Arc::new(BroadcastPublisher::default())),
        })
    }
}
