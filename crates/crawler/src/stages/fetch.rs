use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::fetch::FetchError;
use crate::persistence::CrawlStatus;
use crate::pipeline::{Context, Flow, Stage, StageError};

/// Fetches the page through the environment's fetcher
///
/// Timeouts bump the record's timeout counter so [`super::IgnoreTimeout`]
/// can drop the URL later. Non-2xx answers halt the chain.
pub struct Fetch;

#[async_trait]
impl Stage for Fetch {
    fn name(&self) -> &str {
        "fetch"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let url = ctx.require_url()?.to_string();
        let fetcher = Arc::clone(&ctx.env().fetcher);
        let metadata = Arc::clone(&ctx.env().metadata);

        let result = fetcher.fetch(&url).await;
        let record = ctx.require_record_mut()?;

        match result {
            Ok(page) => {
                record.http_status = Some(page.status);
                if !page.is_success() {
                    let status = page.status;
                    record.status = CrawlStatus::HttpError;
                    metadata.put(record.clone()).await?;
                    ctx.page = Some(page);
                    return Ok(Flow::halt(format!("http status {status}")));
                }
                debug!(%url, status = page.status, bytes = page.body.len(), "Page fetched");
                ctx.page = Some(page);
                Ok(Flow::Continue)
            }
            Err(error) => {
                if error == FetchError::Timeout {
                    record.timeout_failures += 1;
                }
                record.status = CrawlStatus::Failed;
                metadata.put(record.clone()).await?;
                Err(error.into())
            }
        }
    }
}
