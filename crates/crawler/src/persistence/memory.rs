//! In-memory implementations of MetadataStore and PageStore for testing

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::store::*;

/// In-memory implementation of MetadataStore
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<String, CrawlRecord>>,
}

impl InMemoryMetadataStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of records
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Synchronous lookup (for testing)
    pub fn record(&self, url: &str) -> Option<CrawlRecord> {
        self.records.read().get(url).cloned()
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get(&self, url: &str) -> Result<Option<CrawlRecord>, StoreError> {
        Ok(self.records.read().get(url).cloned())
    }

    async fn put(&self, record: CrawlRecord) -> Result<(), StoreError> {
        self.records.write().insert(record.url.clone(), record);
        Ok(())
    }

    async fn insert_if_absent(&self, record: CrawlRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.url) {
            return Ok(false);
        }
        records.insert(record.url.clone(), record);
        Ok(true)
    }

    async fn remove(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(url).is_some())
    }
}

/// In-memory implementation of PageStore
pub struct InMemoryPageStore {
    pages: RwLock<HashMap<String, StoredPage>>,
}

impl InMemoryPageStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
        }
    }

    /// Get the number of stored pages
    pub fn page_count(&self) -> usize {
        self.pages.read().len()
    }

    /// Get a stored page by document id
    pub fn page(&self, id: &str) -> Option<StoredPage> {
        self.pages.read().get(id).cloned()
    }

    /// Find the most recently stored page for a URL
    pub fn page_by_url(&self, url: &str) -> Option<StoredPage> {
        self.pages
            .read()
            .values()
            .filter(|p| p.url == url)
            .max_by_key(|p| p.fetched_at)
            .cloned()
    }
}

impl Default for InMemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageStore for InMemoryPageStore {
    async fn save(&self, page: StoredPage) -> Result<String, StoreError> {
        let id = Uuid::now_v7().to_string();
        self.pages.write().insert(id.clone(), page);
        Ok(id)
    }
}
