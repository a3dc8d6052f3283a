use async_trait::async_trait;

use crate::pipeline::{Context, Flow, Stage, StageError};

/// First stage: takes the task id as the URL to crawl
pub struct Seed;

#[async_trait]
impl Stage for Seed {
    fn name(&self) -> &str {
        "seed"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let raw = ctx.task_id().trim();
        if raw.is_empty() {
            return Err(StageError::InvalidTask("empty task id".to_string()));
        }
        ctx.raw_url = Some(raw.to_string());
        Ok(Flow::Continue)
    }
}
