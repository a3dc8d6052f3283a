//! Stage contract for pipeline execution

use async_trait::async_trait;

use super::Context;
use crate::events::PublishError;
use crate::fetch::FetchError;
use crate::persistence::StoreError;
use crate::queue::QueueError;

/// What the pipeline does after a stage returns successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Run the next stage
    Continue,
    /// Stop the chain; the task counts as handled
    Halt(String),
}

impl Flow {
    /// Halt with a human-readable reason
    pub fn halt(reason: impl Into<String>) -> Self {
        Self::Halt(reason.into())
    }
}

/// Stage failure; aborts the remaining stages of the run
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum StageError {
    /// The task id cannot be processed
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// An earlier stage did not produce state this stage needs
    #[error("missing pipeline state: {0}")]
    MissingState(&'static str),

    /// Fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Queue failed
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Event publication failed
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Stage panicked
    #[error("stage panicked: {0}")]
    Panicked(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl StageError {
    /// Create a generic stage error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A unit of pipeline logic
///
/// Stages run strictly one after another on a context they borrow
/// exclusively, so implementations never need to synchronize on it.
///
/// # Example
///
/// ```ignore
/// struct RejectEmpty;
///
/// #[async_trait]
/// impl Stage for RejectEmpty {
///     fn name(&self) -> &str {
///         "reject_empty"
///     }
///
///     async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
///         if ctx.task_id().is_empty() {
///             return Ok(Flow::halt("empty task"));
///         }
///         Ok(Flow::Continue)
///     }
/// }
/// ```
#[async_trait]
pub trait Stage: Send + Sync {
    /// Human-readable stage name for logging
    fn name(&self) -> &str;

    /// Process the task
    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError>;
}

pub type BoxedStage = Box<dyn Stage>;

/// Lets one stage instance be shared by every pipeline a factory builds
#[async_trait]
impl<S: Stage + ?Sized> Stage for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        (**self).process(ctx).await
    }
}
