//! Stages of the crawl pipeline
//!
//! ```text
//! seed → normalize_url → url_filter → load_metadata → ignore_timeout
//!      → fetch → parse → persist → publish
//! ```
//!
//! Each stage reads what earlier ones left in the [`Context`](crate::pipeline::Context)
//! and either continues, halts the task (filtered, recently fetched, HTTP
//! error), or fails it.

mod fetch;
mod filter;
mod metadata;
mod normalize;
mod parse;
mod persist;
mod publish;
mod seed;

use std::sync::Arc;

pub use fetch::Fetch;
pub use filter::UrlFilter;
pub use metadata::{IgnoreTimeout, LoadMetadata};
pub use normalize::{normalize_url, NormalizeUrl, SiteScope};
pub use parse::{extract_links, Parse};
pub use persist::Persist;
pub use publish::Publish;
pub use seed::Seed;

use crate::config::{ConfigError, CrawlerConfig};
use crate::env::CrawlerEnv;
use crate::pipeline::{Pipeline, PipelineFactory};

/// Factory for the standard crawl pipeline
///
/// Stage settings are read from the environment's config on every build;
/// the URL filter is compiled once up front.
pub struct CrawlPipeline {
    filter: Arc<UrlFilter>,
}

impl CrawlPipeline {
    pub const NAME: &'static str = "crawler";

    pub fn new(config: &CrawlerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            filter: Arc::new(UrlFilter::from_config(config)?),
        })
    }
}

impl PipelineFactory for CrawlPipeline {
    fn build(&self, env: &CrawlerEnv) -> Pipeline {
        let config = &env.config;
        Pipeline::new(Self::NAME)
            .join(Seed)
            .join(NormalizeUrl {
                follow_sub_domain: config.follow_sub_domain,
            })
            .join(Arc::clone(&self.filter))
            .join(LoadMetadata {
                revisit_after: config.revisit_after,
            })
            .join(IgnoreTimeout {
                after_count: config.ignore_timeout_after_count,
            })
            .join(Fetch)
            .join(Parse {
                dispatch_links: config.dispatch_links,
                max_depth: config.max_depth,
            })
            .join(Persist {
                compress_body: config.compress_body,
            })
            .join(Publish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_env;

    #[test]
    fn test_stage_order() {
        let env = test_env();
        let factory = CrawlPipeline::new(&env.config).unwrap();
        let pipeline = factory.build(&env);

        assert_eq!(pipeline.name(), "crawler");
        assert_eq!(
            pipeline.stage_names(),
            vec![
                "seed",
                "normalize_url",
                "url_filter",
                "load_metadata",
                "ignore_timeout",
                "fetch",
                "parse",
                "persist",
                "publish",
            ]
        );
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let config = CrawlerConfig::default().with_disallowed_pattern("(");
        assert!(CrawlPipeline::new(&config).is_err());
    }
}
