use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::persistence::{CrawlRecord, CrawlStatus};
use crate::pipeline::{Context, Flow, Stage, StageError};

/// Loads the URL's crawl record, creating a depth-0 one for unknown URLs
///
/// Halts when the page was fetched successfully less than `revisit_after` ago.
pub struct LoadMetadata {
    pub revisit_after: Duration,
}

impl LoadMetadata {
    fn fetched_recently(&self, record: &CrawlRecord) -> bool {
        if record.status != CrawlStatus::Fetched {
            return false;
        }
        let Some(last) = record.last_fetched_at else {
            return false;
        };
        // A timestamp in the future counts as recent
        Utc::now()
            .signed_duration_since(last)
            .to_std()
            .map(|age| age < self.revisit_after)
            .unwrap_or(true)
    }
}

#[async_trait]
impl Stage for LoadMetadata {
    fn name(&self) -> &str {
        "load_metadata"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let url = ctx.require_url()?.to_string();
        let record = match ctx.env().metadata.get(&url).await? {
            Some(record) => record,
            None => CrawlRecord::new(url, 0),
        };

        let recent = self.fetched_recently(&record);
        ctx.record = Some(record);

        if recent {
            return Ok(Flow::halt("fetched recently"));
        }
        Ok(Flow::Continue)
    }
}

/// Halts on URLs that have timed out too often
///
/// `after_count == 0` disables the check.
pub struct IgnoreTimeout {
    pub after_count: u32,
}

#[async_trait]
impl Stage for IgnoreTimeout {
    fn name(&self) -> &str {
        "ignore_timeout"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let record = ctx.require_record()?;
        if self.after_count > 0 && record.timeout_failures >= self.after_count {
            return Ok(Flow::halt(format!(
                "timed out {} times",
                record.timeout_failures
            )));
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlerConfig;
    use crate::env::CrawlerEnv;
    use crate::persistence::{InMemoryMetadataStore, MetadataStore};
    use crate::testing::StaticFetcher;
    use std::sync::Arc;
    use url::Url;

    const PAGE: &str = "https://a.test/page";

    fn ctx_with(store: Arc<InMemoryMetadataStore>) -> Context {
        let env = CrawlerEnv::builder(CrawlerConfig::default(), Arc::new(StaticFetcher::new()))
            .with_metadata(store)
            .build();
        let mut ctx = Context::new(PAGE, env);
        ctx.url = Some(Url::parse(PAGE).unwrap());
        ctx
    }

    fn stage() -> LoadMetadata {
        LoadMetadata {
            revisit_after: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_unknown_url_gets_fresh_record() {
        let mut ctx = ctx_with(Arc::new(InMemoryMetadataStore::new()));
        assert_eq!(stage().process(&mut ctx).await, Ok(Flow::Continue));

        let record = ctx.record.unwrap();
        assert_eq!(record.url, PAGE);
        assert_eq!(record.depth, 0);
        assert_eq!(record.status, CrawlStatus::New);
    }

    #[tokio::test]
    async fn test_known_url_keeps_depth() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.put(CrawlRecord::new(PAGE, 2)).await.unwrap();

        let mut ctx = ctx_with(store);
        assert_eq!(stage().process(&mut ctx).await, Ok(Flow::Continue));
        assert_eq!(ctx.record.unwrap().depth, 2);
    }

    #[tokio::test]
    async fn test_recent_fetch_halts() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let mut record = CrawlRecord::new(PAGE, 0);
        record.status = CrawlStatus::Fetched;
        record.last_fetched_at = Some(Utc::now() - chrono::Duration::minutes(5));
        store.put(record.clone()).await.unwrap();

        let mut ctx = ctx_with(store.clone());
        assert_eq!(
            stage().process(&mut ctx).await,
            Ok(Flow::halt("fetched recently"))
        );

        // Older than the revisit interval: crawl again
        record.last_fetched_at = Some(Utc::now() - chrono::Duration::hours(2));
        store.put(record).await.unwrap();
        let mut ctx = ctx_with(store);
        assert_eq!(stage().process(&mut ctx).await, Ok(Flow::Continue));
    }

    #[tokio::test]
    async fn test_ignore_timeout_threshold() {
        let mut ctx = ctx_with(Arc::new(InMemoryMetadataStore::new()));
        let mut record = CrawlRecord::new(PAGE, 0);
        record.timeout_failures = 2;
        ctx.record = Some(record);

        assert_eq!(
            IgnoreTimeout { after_count: 3 }.process(&mut ctx).await,
            Ok(Flow::Continue)
        );
        assert_eq!(
            IgnoreTimeout { after_count: 2 }.process(&mut ctx).await,
            Ok(Flow::halt("timed out 2 times"))
        );
        assert_eq!(
            IgnoreTimeout { after_count: 0 }.process(&mut ctx).await,
            Ok(Flow::Continue)
        );
    }
}
