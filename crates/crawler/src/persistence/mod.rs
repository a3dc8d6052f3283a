//! Persistence layer for crawl metadata and pages
//!
//! This module provides:
//! - [`MetadataStore`] trait for per-URL crawl records
//! - [`PageStore`] trait for fetched pages
//! - In-memory implementations of both for testing and local runs

mod memory;
mod store;

pub use memory::{InMemoryMetadataStore, InMemoryPageStore};
pub use store::{CrawlRecord, CrawlStatus, MetadataStore, PageStore, StoreError, StoredPage};
