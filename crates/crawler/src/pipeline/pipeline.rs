//! Ordered stage execution over one shared context.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, trace};

use super::metrics::{PipelineMetrics, StageMetrics};
use super::stage::{BoxedStage, Flow, Stage, StageError};
use super::Context;
use crate::env::CrawlerEnv;

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Every stage returned Continue
    Completed,
    /// A stage stopped the chain without error
    Halted { stage: String, reason: String },
    /// A stage failed or panicked
    Failed { stage: String, error: StageError },
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    pub pipeline: String,
    pub outcome: PipelineOutcome,
    pub metrics: PipelineMetrics,
    /// Context as the last stage left it
    pub context: Context,
}

/// An ordered list of stages, built fresh for each task
pub struct Pipeline {
    name: String,
    stages: Vec<BoxedStage>,
    contain_panics: bool,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            contain_panics: true,
        }
    }

    /// Append a stage
    pub fn join<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Whether a stage panic becomes a `Failed` outcome (default) or unwinds
    /// out of [`Pipeline::run`]
    pub fn contain_panics(mut self, contain: bool) -> Self {
        self.contain_panics = contain;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the stages in order on `ctx`.
    ///
    /// Stops at the first Halt or failure. Never returns an error: failures
    /// are reported through [`PipelineOutcome::Failed`].
    pub async fn run(self, mut ctx: Context) -> PipelineReport {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::with_capacity(self.stages.len());
        let mut outcome = PipelineOutcome::Completed;

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name().to_string();
            let stage_start = Instant::now();
            trace!(pipeline = %self.name, task_id = %ctx.task_id(), stage = %name, "Stage started");

            let result = if self.contain_panics {
                match AssertUnwindSafe(stage.process(&mut ctx)).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(StageError::Panicked(panic_message(panic.as_ref()))),
                }
            } else {
                stage.process(&mut ctx).await
            };

            stage_metrics.push(StageMetrics {
                index,
                name: name.clone(),
                duration_ms: stage_start.elapsed().as_millis(),
            });

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt(reason)) => {
                    debug!(
                        pipeline = %self.name,
                        task_id = %ctx.task_id(),
                        stage = %name,
                        %reason,
                        "Pipeline halted"
                    );
                    outcome = PipelineOutcome::Halted {
                        stage: name,
                        reason,
                    };
                    break;
                }
                Err(error) => {
                    outcome = PipelineOutcome::Failed { stage: name, error };
                    break;
                }
            }
        }

        PipelineReport {
            pipeline: self.name,
            outcome,
            metrics: PipelineMetrics {
                total_duration_ms: total_start.elapsed().as_millis(),
                stages: stage_metrics,
            },
            context: ctx,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Builds the pipeline a worker runs for each task
pub trait PipelineFactory: Send + Sync {
    fn build(&self, env: &CrawlerEnv) -> Pipeline;
}

impl<F> PipelineFactory for F
where
    F: Fn(&CrawlerEnv) -> Pipeline + Send + Sync,
{
    fn build(&self, env: &CrawlerEnv) -> Pipeline {
        self(env)
    }
}
