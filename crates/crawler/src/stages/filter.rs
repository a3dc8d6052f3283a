use async_trait::async_trait;
use regex::Regex;

use crate::config::{ConfigError, CrawlerConfig};
use crate::pipeline::{Context, Flow, Stage, StageError};

/// Halts on URLs the crawler must not fetch
///
/// Compiled once and shared by every pipeline through an `Arc`.
pub struct UrlFilter {
    disallowed: Vec<Regex>,
    max_url_length: usize,
}

impl UrlFilter {
    pub fn new(patterns: &[String], max_url_length: usize) -> Result<Self, ConfigError> {
        let disallowed = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            disallowed,
            max_url_length,
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, ConfigError> {
        Self::new(&config.disallowed_patterns, config.max_url_length)
    }

    /// Reason the URL is rejected, if it is
    pub fn rejection(&self, url: &url::Url) -> Option<String> {
        if !matches!(url.scheme(), "http" | "https") {
            return Some(format!("unsupported scheme {}", url.scheme()));
        }
        if url.as_str().len() > self.max_url_length {
            return Some(format!("url longer than {} bytes", self.max_url_length));
        }
        self.disallowed
            .iter()
            .find(|re| re.is_match(url.as_str()))
            .map(|re| format!("disallowed by pattern {}", re.as_str()))
    }
}

#[async_trait]
impl Stage for UrlFilter {
    fn name(&self) -> &str {
        "url_filter"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let url = ctx.require_url()?;
        Ok(match self.rejection(url) {
            Some(reason) => Flow::Halt(reason),
            None => Flow::Continue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_env;
    use url::Url;

    fn filter() -> UrlFilter {
        UrlFilter::new(&[r"/logout".to_string(), r"\.(zip|exe)$".to_string()], 64).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_rejections() {
        let filter = filter();
        assert_eq!(filter.rejection(&url("https://a.test/page")), None);
        assert_eq!(
            filter.rejection(&url("ftp://a.test/file")),
            Some("unsupported scheme ftp".into())
        );
        assert!(filter
            .rejection(&url("https://a.test/logout?next=/"))
            .unwrap()
            .contains("/logout"));
        assert!(filter.rejection(&url("https://a.test/setup.exe")).is_some());

        let long = format!("https://a.test/{}", "x".repeat(64));
        assert!(filter.rejection(&url(&long)).unwrap().contains("longer"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            UrlFilter::new(&["[".to_string()], 10),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[tokio::test]
    async fn test_stage_halts_disallowed_url() {
        let mut ctx = Context::new("x", test_env());
        ctx.url = Some(url("https://a.test/archive.zip"));
        let flow = filter().process(&mut ctx).await.unwrap();
        assert!(matches!(flow, Flow::Halt(_)));

        ctx.url = Some(url("https://a.test/index.html"));
        assert_eq!(filter().process(&mut ctx).await, Ok(Flow::Continue));
    }

    #[tokio::test]
    async fn test_stage_requires_url() {
        let mut ctx = Context::new("x", test_env());
        assert_eq!(
            filter().process(&mut ctx).await,
            Err(StageError::MissingState("url"))
        );
    }
}
