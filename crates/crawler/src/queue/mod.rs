//! Task queue contract
//!
//! Workers only depend on [`TaskQueue::pop`] waiting until a task id is
//! available on a named channel. [`InMemoryTaskQueue`] backs tests and the
//! standalone worker binary.

mod memory;

use async_trait::async_trait;

pub use memory::InMemoryTaskQueue;

/// Queue errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// Queue was closed and the channel is drained
    #[error("queue is closed")]
    Closed,

    /// Backend failure
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Shared queue of opaque task ids
///
/// Implementations must be safe to call from many workers at once. The
/// future returned by `pop` must be cancel-safe: dropping it before it
/// resolves must not consume a task.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Wait for the next task id on `channel`
    async fn pop(&self, channel: &str) -> Result<String, QueueError>;

    /// Append a task id to `channel`
    async fn push(&self, channel: &str, task: String) -> Result<(), QueueError>;
}
