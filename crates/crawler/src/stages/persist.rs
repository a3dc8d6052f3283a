use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use crate::persistence::{CrawlStatus, StoredPage};
use crate::pipeline::{Context, Flow, Stage, StageError};

/// Stores the fetched page and marks its record as fetched
pub struct Persist {
    /// Gzip the body before saving
    pub compress_body: bool,
}

fn gzip(body: &[u8]) -> Result<Vec<u8>, StageError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder
        .write_all(body)
        .map_err(|e| StageError::other(format!("compress body: {e}")))?;
    encoder
        .finish()
        .map_err(|e| StageError::other(format!("compress body: {e}")))
}

#[async_trait]
impl Stage for Persist {
    fn name(&self) -> &str {
        "persist"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let url = ctx.require_url()?.to_string();
        let page = ctx.require_page()?;

        let body = if self.compress_body {
            gzip(&page.body)?
        } else {
            page.body.clone()
        };
        let fetched_at = Utc::now();
        let stored = StoredPage {
            task_id: ctx.task_id().to_string(),
            url: url.clone(),
            status: page.status,
            content_type: page.content_type.clone(),
            body,
            compressed: self.compress_body,
            links: ctx.links.clone(),
            fetched_at,
        };
        let raw_len = page.body.len();
        let stored_len = stored.body.len();

        let pages = Arc::clone(&ctx.env().pages);
        let metadata = Arc::clone(&ctx.env().metadata);

        let document_id = pages.save(stored).await?;

        let record = ctx.require_record_mut()?;
        record.status = CrawlStatus::Fetched;
        record.timeout_failures = 0;
        record.last_fetched_at = Some(fetched_at);
        metadata.put(record.clone()).await?;

        debug!(%url, %document_id, raw_len, stored_len, "Page persisted");
        ctx.document_id = Some(document_id);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;
    use url::Url;

    use super::*;
    use crate::config::CrawlerConfig;
    use crate::env::CrawlerEnv;
    use crate::fetch::FetchedPage;
    use crate::persistence::{CrawlRecord, InMemoryMetadataStore, InMemoryPageStore};
    use crate::testing::StaticFetcher;

    const PAGE: &str = "https://a.test/";
    const HTML: &str = "<html><body><a href=\"/x\">x</a></body></html>";

    struct Fixture {
        ctx: Context,
        pages: Arc<InMemoryPageStore>,
        metadata: Arc<InMemoryMetadataStore>,
    }

    fn fixture() -> Fixture {
        let pages = Arc::new(InMemoryPageStore::new());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let env = CrawlerEnv::builder(CrawlerConfig::default(), Arc::new(StaticFetcher::new()))
            .with_pages(pages.clone())
            .with_metadata(metadata.clone())
            .build();

        let mut ctx = Context::new(PAGE, env);
        ctx.url = Some(Url::parse(PAGE).unwrap());
        let mut record = CrawlRecord::new(PAGE, 1);
        record.timeout_failures = 2;
        record.http_status = Some(200);
        ctx.record = Some(record);
        ctx.page = Some(FetchedPage {
            final_url: PAGE.into(),
            status: 200,
            content_type: Some("text/html".into()),
            body: HTML.as_bytes().to_vec(),
        });
        ctx.links = vec!["https://a.test/x".into()];
        Fixture {
            ctx,
            pages,
            metadata,
        }
    }

    #[tokio::test]
    async fn test_persists_compressed_page() {
        let mut f = fixture();
        let stage = Persist {
            compress_body: true,
        };

        assert_eq!(stage.process(&mut f.ctx).await, Ok(Flow::Continue));

        let id = f.ctx.document_id.clone().unwrap();
        let stored = f.pages.page(&id).unwrap();
        assert!(stored.compressed);
        assert_eq!(stored.links, vec!["https://a.test/x".to_string()]);

        let mut decoded = String::new();
        GzDecoder::new(stored.body.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, HTML);
    }

    #[tokio::test]
    async fn test_persists_raw_page() {
        let mut f = fixture();
        let stage = Persist {
            compress_body: false,
        };

        stage.process(&mut f.ctx).await.unwrap();
        let stored = f.pages.page_by_url(PAGE).unwrap();
        assert!(!stored.compressed);
        assert_eq!(stored.body, HTML.as_bytes());
    }

    #[tokio::test]
    async fn test_marks_record_fetched() {
        let mut f = fixture();
        Persist {
            compress_body: true,
        }
        .process(&mut f.ctx)
        .await
        .unwrap();

        let record = f.metadata.record(PAGE).unwrap();
        assert_eq!(record.status, CrawlStatus::Fetched);
        assert_eq!(record.timeout_failures, 0);
        assert_eq!(record.depth, 1);
        assert!(record.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_requires_page() {
        let mut f = fixture();
        f.ctx.page = None;
        assert_eq!(
            Persist {
                compress_body: false
            }
            .process(&mut f.ctx)
            .await,
            Err(StageError::MissingState("page"))
        );
        assert_eq!(f.pages.page_count(), 0);
    }
}
