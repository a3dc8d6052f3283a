//! Crawl completion events

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Event published at the end of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// A page was fetched and persisted
    PageCrawled {
        task_id: String,
        url: String,
        document_id: String,
        status: u16,
        depth: u32,
        links_found: usize,
        links_dispatched: usize,
        at: DateTime<Utc>,
    },
}

/// Publisher errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PublishError {
    /// Event sink rejected the event
    #[error("publish failed: {0}")]
    Sink(String),
}

/// Destination for crawl events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event
    async fn publish(&self, event: CrawlEvent) -> Result<(), PublishError>;
}

/// In-process publisher over a broadcast channel
///
/// Publishing with no subscribers is not an error; the event is dropped.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<CrawlEvent>,
}

impl BroadcastPublisher {
    /// Create a publisher buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to subsequent events
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: CrawlEvent) -> Result<(), PublishError> {
        match self.tx.send(event) {
            Ok(receivers) => trace!(receivers, "Published crawl event"),
            Err(_) => trace!("No subscribers for crawl event"),
        }
        Ok(())
    }
}
