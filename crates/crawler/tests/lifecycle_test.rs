//! Lifecycle tests for CrawlerModule: start/stop, drain, fault containment
//! and rate limiting, using recording stages instead of the crawl stages.
//!
//! Run with: cargo test -p crawler --test lifecycle_test

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crawler::pipeline::{Pipeline, PipelineFactory};
use crawler::queue::{InMemoryTaskQueue, TaskQueue};
use crawler::testing::{test_env_with, wait_until, Behavior, RecordingStage};
use crawler::{CrawlerConfig, CrawlerEnv, CrawlerError, CrawlerModule};

/// Factory running `first` followed by a continuing stage
fn factory(first: RecordingStage, last: RecordingStage) -> Arc<dyn PipelineFactory> {
    Arc::new(move |_: &CrawlerEnv| {
        Pipeline::new("test")
            .join(first.clone())
            .join(last.clone())
    })
}

fn noop_factory() -> Arc<dyn PipelineFactory> {
    let (first, _) = RecordingStage::continuing("first");
    let (last, _) = RecordingStage::continuing("last");
    factory(first, last)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_active_workers_follow_lifecycle() {
    for n in [1, 2, 5] {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let env = test_env_with(CrawlerConfig::new().with_worker_count(n), queue);
        let mut module = CrawlerModule::with_factory(noop_factory());

        module.start(env).await.unwrap();
        assert_eq!(module.active_workers(), n);

        module.stop().await.unwrap();
        assert_eq!(module.active_workers(), 0);
        assert_eq!(module.in_flight(), 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_while_running() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let env = test_env_with(CrawlerConfig::new().with_worker_count(2), queue);
    let mut module = CrawlerModule::with_factory(noop_factory());

    module.start(env.clone()).await.unwrap();
    let err = module.start(env).await.unwrap_err();
    assert_eq!(err, CrawlerError::AlreadyRunning);
    assert_eq!(module.active_workers(), 2);

    module.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_while_stopped() {
    let mut module = CrawlerModule::new();
    assert_eq!(module.stop().await, Err(CrawlerError::NotRunning));
}

#[tokio::test]
async fn test_disabled_crawler() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let env = test_env_with(CrawlerConfig::new().with_enabled(false), queue);
    let mut module = CrawlerModule::with_factory(noop_factory());

    module.start(env).await.unwrap();
    assert_eq!(module.active_workers(), 0);
    assert_eq!(module.stop().await, Err(CrawlerError::NotRunning));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_stop_drains_in_flight_task() {
    let delay = Duration::from_millis(300);
    let queue = Arc::new(InMemoryTaskQueue::new());
    let env = test_env_with(CrawlerConfig::new().with_worker_count(3), queue.clone());
    let (slow, _) = RecordingStage::sleeping("slow", delay);
    let (last, last_calls) = RecordingStage::continuing("last");

    let mut module = CrawlerModule::with_factory(factory(slow.clone(), last));
    module.start(env).await.unwrap();

    let started = Instant::now();
    queue.push("fetch", "slow-task".into()).await.unwrap();
    wait_until(|| slow.calls() == 1).await;
    assert_eq!(module.in_flight(), 1);

    module.stop().await.unwrap();
    assert!(started.elapsed() >= delay);
    assert_eq!(last_calls.load(Ordering::SeqCst), 1);
    assert_eq!(module.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_task_does_not_stop_worker() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let env = test_env_with(CrawlerConfig::new().with_worker_count(1), queue.clone());
    let (first, _) = RecordingStage::new(
        "first",
        Behavior::PanicOn(vec!["bad".to_string()]),
    );
    let (last, last_calls) = RecordingStage::continuing("last");

    let mut module = CrawlerModule::with_factory(factory(first, last));
    module.start(env).await.unwrap();

    queue.push("fetch", "bad".into()).await.unwrap();
    queue.push("fetch", "good".into()).await.unwrap();
    wait_until(|| module.stats().processed == 2).await;

    let stats = module.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(last_calls.load(Ordering::SeqCst), 1);
    assert_eq!(module.active_workers(), 1);

    module.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stage_error_is_contained() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let env = test_env_with(CrawlerConfig::new().with_worker_count(2), queue.clone());
    let (first, first_calls) = RecordingStage::failing("first");
    let (last, last_calls) = RecordingStage::continuing("last");

    let mut module = CrawlerModule::with_factory(factory(first, last));
    module.start(env).await.unwrap();

    for i in 0..5 {
        queue.push("fetch", format!("task-{i}")).await.unwrap();
    }
    wait_until(|| module.stats().processed == 5).await;

    assert_eq!(module.stats().failed, 5);
    assert_eq!(first_calls.load(Ordering::SeqCst), 5);
    assert_eq!(last_calls.load(Ordering::SeqCst), 0);

    module.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_debug_panic_still_acknowledges_stop() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let config = CrawlerConfig::new().with_worker_count(1).with_debug(true);
    let env = test_env_with(config, queue.clone());
    let (first, first_calls) = RecordingStage::panicking("first");
    let (last, _) = RecordingStage::continuing("last");

    let mut module = CrawlerModule::with_factory(factory(first, last));
    module.start(env).await.unwrap();

    queue.push("fetch", "boom".into()).await.unwrap();
    wait_until(|| first_calls.load(Ordering::SeqCst) == 1).await;
    wait_until(|| module.in_flight() == 0).await;

    module.stop().await.unwrap();
    assert_eq!(module.active_workers(), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_debug_panic_keeps_worker_serving() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let config = CrawlerConfig::new().with_worker_count(1).with_debug(true);
    let env = test_env_with(config, queue.clone());
    let (first, _) = RecordingStage::new(
        "first",
        Behavior::PanicOn(vec!["boom".to_string()]),
    );
    let (last, last_calls) = RecordingStage::continuing("last");

    let mut module = CrawlerModule::with_factory(factory(first, last));
    module.start(env).await.unwrap();

    queue.push("fetch", "boom".into()).await.unwrap();
    queue.push("fetch", "good".into()).await.unwrap();
    wait_until(|| module.stats().completed == 1).await;

    assert!(queue.is_empty("fetch"));
    assert_eq!(last_calls.load(Ordering::SeqCst), 1);
    assert_eq!(module.active_workers(), 1);
    assert_eq!(module.stats().restarts, 1);

    module.stop().await.unwrap();
    assert_eq!(module.active_workers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delay_between_tasks() {
    let delay = Duration::from_millis(100);
    let tasks = 4;
    let queue = Arc::new(InMemoryTaskQueue::new());
    let config = CrawlerConfig::new()
        .with_worker_count(1)
        .with_fetch_delay(delay);
    let env = test_env_with(config, queue.clone());
    let (first, first_calls) = RecordingStage::continuing("first");
    let (last, _) = RecordingStage::continuing("last");

    for i in 0..tasks {
        queue.push("fetch", format!("task-{i}")).await.unwrap();
    }

    let mut module = CrawlerModule::with_factory(factory(first, last));
    let started = Instant::now();
    module.start(env).await.unwrap();
    wait_until(|| first_calls.load(Ordering::SeqCst) == tasks).await;

    assert!(started.elapsed() >= delay * (tasks as u32 - 1));
    module.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_interrupts_delay() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let config = CrawlerConfig::new()
        .with_worker_count(1)
        .with_fetch_delay(Duration::from_secs(30));
    let env = test_env_with(config, queue.clone());
    let (first, first_calls) = RecordingStage::continuing("first");
    let (last, _) = RecordingStage::continuing("last");

    let mut module = CrawlerModule::with_factory(factory(first, last));
    module.start(env).await.unwrap();
    queue.push("fetch", "task".into()).await.unwrap();
    wait_until(|| first_calls.load(Ordering::SeqCst) == 1).await;

    let started = Instant::now();
    module.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_after_stop() {
    let queue = Arc::new(InMemoryTaskQueue::new());
    let env = test_env_with(CrawlerConfig::new().with_worker_count(2), queue.clone());
    let (first, first_calls) = RecordingStage::continuing("first");
    let (last, _) = RecordingStage::continuing("last");
    let mut module = CrawlerModule::with_factory(factory(first, last));

    module.start(env.clone()).await.unwrap();
    module.stop().await.unwrap();

    module.start(env).await.unwrap();
    assert_eq!(module.active_workers(), 2);
    queue.push("fetch", "after-restart".into()).await.unwrap();
    wait_until(|| first_calls.load(Ordering::SeqCst) == 1).await;
    module.stop().await.unwrap();
}
