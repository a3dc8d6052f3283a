//! In-memory implementation of TaskQueue

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{QueueError, TaskQueue};

/// In-memory FIFO queue with named channels
///
/// # Example
///
/// ```
/// use crawler::queue::{InMemoryTaskQueue, TaskQueue};
///
/// # tokio_test::block_on(async {
/// let queue = InMemoryTaskQueue::new();
/// queue.push("fetch", "https://example.com/".to_string()).await.unwrap();
/// assert_eq!(queue.pop("fetch").await.unwrap(), "https://example.com/");
/// # });
/// ```
pub struct InMemoryTaskQueue {
    channels: Mutex<HashMap<String, VecDeque<String>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl InMemoryTaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of task ids waiting on `channel`
    pub fn len(&self, channel: &str) -> usize {
        self.channels.lock().get(channel).map_or(0, VecDeque::len)
    }

    /// Whether `channel` has no waiting task ids
    pub fn is_empty(&self, channel: &str) -> bool {
        self.len(channel) == 0
    }

    /// Snapshot of the task ids waiting on `channel`, oldest first
    pub fn pending(&self, channel: &str) -> Vec<String> {
        self.channels
            .lock()
            .get(channel)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Close the queue; pops fail with [`QueueError::Closed`] once drained
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn try_pop(&self, channel: &str) -> Option<String> {
        self.channels.lock().get_mut(channel)?.pop_front()
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn pop(&self, channel: &str) -> Result<String, QueueError> {
        loop {
            // Register interest before checking so a concurrent push is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.try_pop(channel) {
                return Ok(task);
            }
            if self.closed.load(Ordering::SeqCst) {
                return Err(QueueError::Closed);
            }

            notified.await;
        }
    }

    async fn push(&self, channel: &str, task: String) -> Result<(), QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push_back(task);
        self.notify.notify_waiters();
        Ok(())
    }
}
