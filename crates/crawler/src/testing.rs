//! Test doubles for stages, fetching and environments
//!
//! Used by the crate's own tests and available to downstream crates that
//! want to exercise custom stages without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::CrawlerConfig;
use crate::env::CrawlerEnv;
use crate::fetch::{FetchError, FetchedPage, Fetcher};
use crate::pipeline::{Context, Flow, Stage, StageError};
use crate::queue::{InMemoryTaskQueue, TaskQueue};

/// What a [`RecordingStage`] does when invoked
#[derive(Debug, Clone)]
pub enum Behavior {
    Continue,
    Halt,
    Fail,
    Panic,
    /// Sleep, then continue
    Sleep(Duration),
    /// Panic for the listed task ids, continue for every other one
    PanicOn(Vec<String>),
}

/// Stage that counts its invocations and behaves as configured
///
/// The counter is incremented before the behavior runs, so a sleeping
/// stage is observable as started while it is still in progress.
#[derive(Debug, Clone)]
pub struct RecordingStage {
    name: String,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
}

impl RecordingStage {
    pub fn new(name: impl Into<String>, behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let stage = Self {
            name: name.into(),
            behavior,
            calls: Arc::clone(&calls),
        };
        (stage, calls)
    }

    /// Continuing stage reporting into an existing counter
    pub fn with_counter(name: impl Into<String>, calls: Arc<AtomicUsize>) -> Self {
        Self {
            name: name.into(),
            behavior: Behavior::Continue,
            calls,
        }
    }

    pub fn continuing(name: &str) -> (Self, Arc<AtomicUsize>) {
        Self::new(name, Behavior::Continue)
    }

    pub fn halting(name: &str) -> (Self, Arc<AtomicUsize>) {
        Self::new(name, Behavior::Halt)
    }

    pub fn failing(name: &str) -> (Self, Arc<AtomicUsize>) {
        Self::new(name, Behavior::Fail)
    }

    pub fn panicking(name: &str) -> (Self, Arc<AtomicUsize>) {
        Self::new(name, Behavior::Panic)
    }

    pub fn sleeping(name: &str, duration: Duration) -> (Self, Arc<AtomicUsize>) {
        Self::new(name, Behavior::Sleep(duration))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Continue => Ok(Flow::Continue),
            Behavior::Halt => Ok(Flow::halt(format!("{} halted", self.name))),
            Behavior::Fail => Err(StageError::other(format!("{} failed", self.name))),
            Behavior::Panic => panic!("{} panicked", self.name),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Flow::Continue)
            }
            Behavior::PanicOn(tasks) => {
                if tasks.iter().any(|t| t == ctx.task_id()) {
                    panic!("{} panicked on {}", self.name, ctx.task_id());
                }
                Ok(Flow::Continue)
            }
        }
    }
}

/// Fetcher answering from a fixed table of responses
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, Result<FetchedPage, FetchError>>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an HTML page with status 200 for `url`
    pub fn with_html(self, url: &str, html: &str) -> Self {
        self.with_response(
            url,
            Ok(FetchedPage {
                final_url: url.to_string(),
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: html.as_bytes().to_vec(),
            }),
        )
    }

    /// Serve an empty body with `status` for `url`
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(
            url,
            Ok(FetchedPage {
                final_url: url.to_string(),
                status,
                content_type: None,
                body: Vec::new(),
            }),
        )
    }

    /// Fail fetches of `url` with `error`
    pub fn with_error(self, url: &str, error: FetchError) -> Self {
        self.with_response(url, Err(error))
    }

    fn with_response(self, url: &str, response: Result<FetchedPage, FetchError>) -> Self {
        self.responses.lock().insert(url.to_string(), response);
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.requests.lock().push(url.to_string());
        self.responses
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Transport(format!("no route to {url}"))))
    }
}

/// Environment with default config, in-memory collaborators and an empty fetcher
pub fn test_env() -> Arc<CrawlerEnv> {
    CrawlerEnv::builder(CrawlerConfig::default(), Arc::new(StaticFetcher::new())).build()
}

/// Environment with `config` and `queue`, other collaborators in-memory
pub fn test_env_with(config: CrawlerConfig, queue: Arc<InMemoryTaskQueue>) -> Arc<CrawlerEnv> {
    let queue: Arc<dyn TaskQueue> = queue;
    CrawlerEnv::builder(config, Arc::new(StaticFetcher::new()))
        .with_queue(queue)
        .build()
}

/// Poll `condition` until it holds, panicking after five seconds
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within 5s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
