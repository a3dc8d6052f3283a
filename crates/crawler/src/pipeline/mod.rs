//! Ordered-stage pipeline execution.
//!
//! A pipeline is an ordered list of [`Stage`]s sharing one mutable
//! [`Context`]. It is built fresh for every task and thrown away once the
//! task's outcome is known.
//!
//! ## Architecture
//!
//! ```text
//! PipelineFactory → Pipeline → Stages
//!
//! - PipelineFactory: builds the stage list for each task
//! - Pipeline: runs stages in order, stops on Halt or failure
//! - Stage: process(&mut Context) -> Continue | Halt | Err
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use crawler::pipeline::{Context, Pipeline};
//!
//! let report = Pipeline::new("crawler")
//!     .join(Seed)
//!     .join(NormalizeUrl { follow_sub_domain: true })
//!     .run(Context::new(task_id, env))
//!     .await;
//!
//! if let PipelineOutcome::Failed { stage, error } = report.outcome {
//!     tracing::error!(%stage, %error, "task failed");
//! }
//! ```

mod context;
mod metrics;
#[allow(clippy::module_inception)]
mod pipeline;
mod stage;

pub use context::Context;
pub use metrics::{PipelineMetrics, StageMetrics};
pub use pipeline::{Pipeline, PipelineFactory, PipelineOutcome, PipelineReport};
pub use stage::{BoxedStage, Flow, Stage, StageError};
