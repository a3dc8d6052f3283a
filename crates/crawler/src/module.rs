//! Start/Stop lifecycle of the crawler
//!
//! [`CrawlerModule`] is the only surface a host process needs: `start` reads
//! the enabled flag and worker count from the environment's config and
//! spawns the pool, `stop` drains it.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::ConfigError;
use crate::env::CrawlerEnv;
use crate::pipeline::PipelineFactory;
use crate::stages::CrawlPipeline;
use crate::worker::{PoolStats, WorkerPool};

/// Lifecycle errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CrawlerError {
    /// Start called while running
    #[error("crawler is already running")]
    AlreadyRunning,

    /// Stop called while stopped
    #[error("crawler is not running")]
    NotRunning,

    /// Configuration rejected at start
    #[error("invalid crawler configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Module state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Stopped,
    Running,
}

/// The crawler lifecycle facade
///
/// Owns the worker pool between a successful [`start`](Self::start) and the
/// matching [`stop`](Self::stop). Both take `&mut self`, so they cannot race
/// each other.
///
/// # Example
///
/// ```ignore
/// let mut module = CrawlerModule::new();
/// module.start(env).await?;
///
/// tokio::signal::ctrl_c().await?;
/// module.stop().await?;
/// ```
pub struct CrawlerModule {
    state: ModuleState,
    pool: Option<WorkerPool>,
    factory: Option<Arc<dyn PipelineFactory>>,
}

impl CrawlerModule {
    /// Module running the standard [`CrawlPipeline`]
    pub fn new() -> Self {
        Self {
            state: ModuleState::Stopped,
            pool: None,
            factory: None,
        }
    }

    /// Module running pipelines built by `factory`
    pub fn with_factory(factory: Arc<dyn PipelineFactory>) -> Self {
        Self {
            factory: Some(factory),
            ..Self::new()
        }
    }

    pub fn name(&self) -> &'static str {
        "Crawler"
    }

    /// Spawn the worker pool
    ///
    /// A disabled crawler spawns nothing and stays stopped; that is not an
    /// error. Calling this while running fails with
    /// [`CrawlerError::AlreadyRunning`] and leaves the pool untouched.
    #[instrument(skip_all, fields(module = self.name()))]
    pub async fn start(&mut self, env: Arc<CrawlerEnv>) -> Result<(), CrawlerError> {
        if self.state == ModuleState::Running {
            error!("Start called while the crawler is running");
            return Err(CrawlerError::AlreadyRunning);
        }

        let config = &env.config;
        if !config.enabled {
            info!("Crawler is disabled, no workers started");
            return Ok(());
        }
        config.validate()?;

        let factory = match &self.factory {
            Some(factory) => Arc::clone(factory),
            None => Arc::new(CrawlPipeline::new(config)?),
        };

        info!(
            workers = config.worker_count,
            debug = config.debug,
            "Starting crawler"
        );
        self.pool = Some(WorkerPool::spawn(env, factory));
        self.state = ModuleState::Running;
        Ok(())
    }

    /// Stop accepting tasks and wait until every worker drained
    ///
    /// Returns only after each worker acknowledged stop, so no task is
    /// running once this resolves. There is no timeout.
    #[instrument(skip_all, fields(module = self.name()))]
    pub async fn stop(&mut self) -> Result<(), CrawlerError> {
        if self.state != ModuleState::Running {
            error!("Stop called while the crawler is not running");
            return Err(CrawlerError::NotRunning);
        }

        info!("Stopping crawler");
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown().await;
        }
        self.state = ModuleState::Stopped;
        info!("Crawler stopped");
        Ok(())
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ModuleState::Running
    }

    /// Workers that have not acknowledged stop; zero while stopped
    pub fn active_workers(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::active_workers)
    }

    /// Tasks currently executing; zero while stopped
    pub fn in_flight(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::in_flight)
    }

    /// Task counters of the current pool
    pub fn stats(&self) -> PoolStats {
        self.pool.as_ref().map(WorkerPool::stats).unwrap_or_default()
    }
}

impl Default for CrawlerModule {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::queue::InMemoryTaskQueue;
    use crate::testing::test_env_with;

    fn env(config: CrawlerConfig) -> Arc<CrawlerEnv> {
        test_env_with(config, Arc::new(InMemoryTaskQueue::new()))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_stop() {
        let mut module = CrawlerModule::new();
        assert_eq!(module.name(), "Crawler");
        assert_eq!(module.state(), ModuleState::Stopped);

        module
            .start(env(CrawlerConfig::new().with_worker_count(2)))
            .await
            .unwrap();
        assert!(module.is_running());
        assert_eq!(module.active_workers(), 2);

        module.stop().await.unwrap();
        assert!(!module.is_running());
        assert_eq!(module.active_workers(), 0);
        assert_eq!(module.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_twice() {
        let mut module = CrawlerModule::new();
        let env = env(CrawlerConfig::new().with_worker_count(3));

        module.start(env.clone()).await.unwrap();
        assert_eq!(module.start(env).await, Err(CrawlerError::AlreadyRunning));
        assert_eq!(module.active_workers(), 3);

        module.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_stopped() {
        let mut module = CrawlerModule::new();
        assert_eq!(module.stop().await, Err(CrawlerError::NotRunning));
        assert_eq!(module.state(), ModuleState::Stopped);
    }

    #[tokio::test]
    async fn test_disabled_start() {
        let mut module = CrawlerModule::new();
        module
            .start(env(CrawlerConfig::new().with_enabled(false)))
            .await
            .unwrap();

        assert!(!module.is_running());
        assert_eq!(module.active_workers(), 0);
        assert_eq!(module.stop().await, Err(CrawlerError::NotRunning));
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let mut module = CrawlerModule::new();
        let result = module
            .start(env(CrawlerConfig::new().with_worker_count(0)))
            .await;
        assert_eq!(result, Err(CrawlerError::Config(ConfigError::ZeroWorkers)));

        let result = module
            .start(env(CrawlerConfig::new().with_disallowed_pattern("[")))
            .await;
        assert!(matches!(result, Err(CrawlerError::Config(_))));
        assert!(!module.is_running());
    }
}
