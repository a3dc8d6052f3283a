use async_trait::async_trait;
use chrono::Utc;

use crate::events::CrawlEvent;
use crate::pipeline::{Context, Flow, Stage, StageError};

/// Announces a crawled page to the event publisher
pub struct Publish;

#[async_trait]
impl Stage for Publish {
    fn name(&self) -> &str {
        "publish"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let document_id = ctx
            .document_id
            .clone()
            .ok_or(StageError::MissingState("document_id"))?;
        let record = ctx.require_record()?;
        let page = ctx.require_page()?;

        let event = CrawlEvent::PageCrawled {
            task_id: ctx.task_id().to_string(),
            url: record.url.clone(),
            document_id,
            status: page.status,
            depth: record.depth,
            links_found: ctx.links.len(),
            links_dispatched: ctx.dispatched,
            at: Utc::now(),
        };
        ctx.env().events.publish(event).await?;
        Ok(Flow::Continue)
    }
}
