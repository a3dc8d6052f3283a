//! Worker pool for task execution
//!
//! Owns a fixed set of workers and coordinates their graceful shutdown.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::worker::{WorkerHandle, WorkerState};
use crate::env::CrawlerEnv;
use crate::pipeline::PipelineFactory;

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPoolStatus {
    /// Workers are running and accepting tasks
    Running,
    /// Stop requested, workers finishing current tasks
    Draining,
    /// Every worker acknowledged stop
    Stopped,
}

/// Aggregated task counters across all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Tasks whose pipeline ran to an outcome
    pub processed: u64,
    /// Tasks that ran every stage
    pub completed: u64,
    /// Tasks stopped early by a stage
    pub halted: u64,
    /// Tasks that failed or panicked
    pub failed: u64,
    /// Work loops spawned again after ending without a stop request
    pub restarts: u64,
}

/// Fixed-size pool of crawler workers
///
/// # Example
///
/// ```ignore
/// use crawler::worker::WorkerPool;
///
/// let factory = Arc::new(CrawlPipeline::new(&env.config)?);
/// let mut pool = WorkerPool::spawn(env.clone(), factory);
/// assert_eq!(pool.active_workers(), env.config.worker_count);
///
/// // ... later, graceful shutdown
/// pool.shutdown().await;
/// assert_eq!(pool.in_flight(), 0);
/// ```
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    status: WorkerPoolStatus,
}

impl WorkerPool {
    /// Spawn `env.config.worker_count` workers on the current runtime
    #[instrument(skip_all, fields(workers = env.config.worker_count))]
    pub fn spawn(env: Arc<CrawlerEnv>, factory: Arc<dyn PipelineFactory>) -> Self {
        let workers = (0..env.config.worker_count)
            .map(|shard| WorkerHandle::spawn(shard, Arc::clone(&env), Arc::clone(&factory)))
            .collect::<Vec<_>>();

        info!(
            workers = workers.len(),
            channel = %env.config.fetch_channel,
            delay_ms = env.config.fetch_delay_threshold.as_millis() as u64,
            "Worker pool started"
        );

        Self {
            workers,
            status: WorkerPoolStatus::Running,
        }
    }

    /// Stop every worker and wait until all of them drained
    ///
    /// Phase 1 posts a stop request to every worker without waiting, so they
    /// all start draining together. Phase 2 collects the acknowledgements in
    /// shard order. Calling it again after it returned is a no-op.
    #[instrument(skip_all, fields(workers = self.workers.len()))]
    pub async fn shutdown(&mut self) {
        if self.status == WorkerPoolStatus::Stopped {
            return;
        }

        debug!("Start shutting down worker pool");
        self.status = WorkerPoolStatus::Draining;

        for worker in &mut self.workers {
            worker.request_stop();
        }

        for worker in &mut self.workers {
            debug!(shard = worker.shard, "Waiting for worker exit");
            worker.wait_stopped().await;
        }

        self.status = WorkerPoolStatus::Stopped;
        info!(stats = ?self.stats(), "Worker pool stopped");
    }

    pub fn status(&self) -> WorkerPoolStatus {
        self.status
    }

    /// Number of workers the pool was created with
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Workers that have not acknowledged stop yet
    pub fn active_workers(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.state() != WorkerState::Terminated)
            .count()
    }

    /// Tasks currently running across the pool
    pub fn in_flight(&self) -> usize {
        self.workers.iter().map(|w| w.in_flight()).sum()
    }

    pub fn stats(&self) -> PoolStats {
        self.workers.iter().fold(PoolStats::default(), |mut acc, w| {
            acc.processed += w.stats.processed.load(Ordering::Relaxed);
            acc.completed += w.stats.completed.load(Ordering::Relaxed);
            acc.halted += w.stats.halted.load(Ordering::Relaxed);
            acc.failed += w.stats.failed.load(Ordering::Relaxed);
            acc.restarts += w.stats.restarts.load(Ordering::Relaxed);
            acc
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropped stop mailboxes make the workers drain on their own
        if self.status != WorkerPoolStatus::Stopped {
            debug!("Worker pool dropped without shutdown, workers will drain detached");
        }
    }
}
