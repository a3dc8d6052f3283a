//! A single crawler worker: work loop plus stop handshake
//!
//! Each worker runs two tokio tasks:
//! - the work loop pops task ids and runs one pipeline per task;
//! - the control path waits for a stop request, cancels the work loop,
//!   waits on the in-flight barrier and posts the stop acknowledgement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::env::CrawlerEnv;
use crate::pipeline::{Context, PipelineFactory, PipelineOutcome};

/// Lifecycle of one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Polling the queue or running a task
    Active,
    /// Stop requested, finishing the current task
    Draining,
    /// Stop acknowledged
    Terminated,
}

/// Per-worker task counters
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    pub(crate) processed: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) halted: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) restarts: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &PipelineOutcome) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            PipelineOutcome::Completed => &self.completed,
            PipelineOutcome::Halted { .. } => &self.halted,
            PipelineOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Controller-side view of a running worker
pub(crate) struct WorkerHandle {
    pub(crate) shard: usize,
    stop_tx: Option<oneshot::Sender<()>>,
    ack_rx: Option<oneshot::Receiver<usize>>,
    in_flight: Arc<Semaphore>,
    state: Arc<RwLock<WorkerState>>,
    pub(crate) stats: Arc<WorkerStats>,
}

impl WorkerHandle {
    /// Spawn worker `shard` on the current runtime
    pub(crate) fn spawn(
        shard: usize,
        env: Arc<CrawlerEnv>,
        factory: Arc<dyn PipelineFactory>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (ack_tx, ack_rx) = oneshot::channel();
        let in_flight = Arc::new(Semaphore::new(1));
        let state = Arc::new(RwLock::new(WorkerState::Active));
        let stats = Arc::new(WorkerStats::default());
        let cancel = CancellationToken::new();

        let worker = Worker {
            shard,
            env,
            factory,
            in_flight: Arc::clone(&in_flight),
            cancel: cancel.clone(),
            stats: Arc::clone(&stats),
        };

        tokio::spawn(control(
            worker,
            stop_rx,
            ack_tx,
            cancel,
            Arc::clone(&in_flight),
            Arc::clone(&state),
        ));

        trace!(shard, "Started crawler worker");

        Self {
            shard,
            stop_tx: Some(stop_tx),
            ack_rx: Some(ack_rx),
            in_flight,
            state,
            stats,
        }
    }

    /// Post the stop request without waiting
    pub(crate) fn request_stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            // A closed mailbox means the control path is already gone
            let _ = tx.send(());
            debug!(shard = self.shard, "Sent exit signal to worker");
        }
    }

    /// Wait for the stop acknowledgement
    pub(crate) async fn wait_stopped(&mut self) {
        let Some(rx) = self.ack_rx.take() else {
            return;
        };
        match rx.await {
            Ok(shard) => debug!(shard, "Received final exit signal from worker"),
            Err(_) => warn!(shard = self.shard, "Worker control path ended without acknowledging"),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// 1 while a task is running on this worker, else 0
    pub(crate) fn in_flight(&self) -> usize {
        1 - self.in_flight.available_permits().min(1)
    }
}

/// Control path: stop request -> cancel -> drain barrier -> ack
///
/// Until the stop request arrives, a work loop that ends on its own (a stage
/// panic in debug mode) is logged and spawned again, so the pool keeps its
/// size.
async fn control(
    worker: Worker,
    mut stop_rx: oneshot::Receiver<()>,
    ack_tx: oneshot::Sender<usize>,
    cancel: CancellationToken,
    in_flight: Arc<Semaphore>,
    state: Arc<RwLock<WorkerState>>,
) {
    let shard = worker.shard;
    let mut work_loop = tokio::spawn(worker.clone().run());

    loop {
        tokio::select! {
            biased;
            // A dropped handle counts as a stop request
            _ = &mut stop_rx => break,
            joined = &mut work_loop => {
                match joined {
                    Err(e) if e.is_panic() => error!(shard, "Worker loop panicked, restarting: {}", e),
                    Err(e) => error!(shard, "Worker loop aborted, restarting: {}", e),
                    Ok(()) => warn!(shard, "Worker loop exited before stop, restarting"),
                }
                worker.stats.restarts.fetch_add(1, Ordering::Relaxed);
                work_loop = tokio::spawn(worker.clone().run());
            }
        }
    }

    *state.write() = WorkerState::Draining;
    trace!(shard, "Worker going to exit, waiting for task to finish");
    cancel.cancel();

    match in_flight.acquire().await {
        Ok(permit) => drop(permit),
        Err(_) => warn!(shard, "In-flight barrier closed"),
    }

    match work_loop.await {
        Ok(()) => trace!(shard, "Worker task finished"),
        Err(e) if e.is_panic() => error!(shard, "Worker loop panicked: {}", e),
        Err(e) => error!(shard, "Worker loop aborted: {}", e),
    }

    *state.write() = WorkerState::Terminated;
    if ack_tx.send(shard).is_err() {
        debug!(shard, "Nobody waiting for worker exit acknowledgement");
    }
    trace!(shard, "Worker exited");
}

#[derive(Clone)]
struct Worker {
    shard: usize,
    env: Arc<CrawlerEnv>,
    factory: Arc<dyn PipelineFactory>,
    in_flight: Arc<Semaphore>,
    cancel: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl Worker {
    async fn run(self) {
        let shard = self.shard;
        let channel = self.env.config.fetch_channel.clone();
        let delay = self.env.config.fetch_delay_threshold;
        let backoff = self.env.config.queue_error_backoff;

        loop {
            trace!(shard, "Waiting for url to fetch");
            let popped = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                popped = self.env.queue.pop(&channel) => popped,
            };

            let pause = match popped {
                Ok(task_id) => {
                    self.execute(task_id).await;
                    delay
                }
                Err(e) => {
                    warn!(shard, error = %e, "Failed to pop task");
                    backoff
                }
            };

            if !pause.is_zero() {
                debug!(shard, pause_ms = pause.as_millis() as u64, "Sleeping to control crawling speed");
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        trace!(shard, "Worker loop exited");
    }

    async fn execute(&self, task_id: String) {
        let shard = self.shard;
        // Held until the outcome is known, also while unwinding in debug mode
        let _permit = match self.in_flight.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(shard, %task_id, "In-flight barrier closed, dropping task");
                return;
            }
        };

        trace!(shard, %task_id, "Task received");

        let pipeline = self
            .factory
            .build(&self.env)
            .contain_panics(!self.env.config.debug);
        let ctx = Context::new(task_id.clone(), Arc::clone(&self.env));
        let report = pipeline.run(ctx).await;

        self.stats.record(&report.outcome);
        match &report.outcome {
            PipelineOutcome::Completed => {
                trace!(shard, %task_id, duration_ms = report.metrics.total_duration_ms as u64, "Task finished");
            }
            PipelineOutcome::Halted { stage, reason } => {
                debug!(shard, %task_id, %stage, %reason, "Task halted");
            }
            PipelineOutcome::Failed { stage, error } => {
                error!(
                    shard,
                    pipeline = %report.pipeline,
                    %task_id,
                    %stage,
                    %error,
                    stages_run = ?report.metrics.stages_run(),
                    "Error in crawler pipeline"
                );
            }
        }
    }
}
