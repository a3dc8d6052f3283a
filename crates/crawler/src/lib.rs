//! Crawler worker pool and pipeline engine
//!
//! Pulls task ids from a shared queue and runs each one through an ordered
//! chain of stages, on a fixed number of workers that can be stopped
//! without abandoning a task halfway.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  start/stop   ┌──────────────┐
//! │ CrawlerModule │──────────────▶│  WorkerPool  │
//! └───────────────┘               └──────┬───────┘
//!                                        │ N workers
//!                           pop          ▼
//! ┌───────────┐ ◀──────────────── ┌──────────────┐  build  ┌─────────────────┐
//! │ TaskQueue │                   │    Worker    │────────▶│ PipelineFactory │
//! └───────────┘ ────────────────▶ └──────┬───────┘         └─────────────────┘
//!                 task id                │ run
//!                                        ▼
//!                                 ┌──────────────┐
//!                                 │   Pipeline   │ stage → stage → ... → stage
//!                                 └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`module`]: Start/Stop lifecycle facade
//! - [`worker`]: worker pool, drain handshake, rate limiting
//! - [`pipeline`]: stage contract, context and ordered execution
//! - [`stages`]: the crawl stages and [`stages::CrawlPipeline`]
//! - [`queue`], [`persistence`], [`fetch`], [`events`]: collaborators stages talk to
//! - [`config`], [`telemetry`]: settings and logging
//!
//! # Example
//!
//! ```ignore
//! use crawler::prelude::*;
//!
//! let config = CrawlerConfig::from_env()?;
//! let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout, &config.user_agent)?);
//! let env = CrawlerEnv::builder(config, fetcher).build();
//!
//! let mut module = CrawlerModule::new();
//! module.start(env).await?;
//! // ...
//! module.stop().await?;
//! ```

pub mod config;
pub mod env;
pub mod events;
pub mod fetch;
pub mod module;
pub mod persistence;
pub mod pipeline;
pub mod queue;
pub mod stages;
pub mod telemetry;
pub mod testing;
pub mod worker;

pub use config::{ConfigError, CrawlerConfig};
pub use env::{CrawlerEnv, CrawlerEnvBuilder};
pub use module::{CrawlerError, CrawlerModule, ModuleState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{ConfigError, CrawlerConfig};
    pub use crate::env::CrawlerEnv;
    pub use crate::events::{BroadcastPublisher, CrawlEvent, EventPublisher};
    pub use crate::fetch::{FetchError, FetchedPage, Fetcher, HttpFetcher};
    pub use crate::module::{CrawlerError, CrawlerModule};
    pub use crate::persistence::{CrawlRecord, CrawlStatus, MetadataStore, PageStore};
    pub use crate::pipeline::{
        Context, Flow, Pipeline, PipelineFactory, PipelineOutcome, Stage, StageError,
    };
    pub use crate::queue::{InMemoryTaskQueue, QueueError, TaskQueue};
    pub use crate::stages::CrawlPipeline;
    pub use crate::worker::{PoolStats, WorkerPool};
}
