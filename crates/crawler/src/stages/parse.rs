use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, trace, warn};
use url::Url;

use crate::persistence::CrawlRecord;
use crate::pipeline::{Context, Flow, Stage, StageError};

/// Absolute http(s) links of an HTML document, fragment-free, in document order
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Extracts links and optionally dispatches same-site ones back to the queue
///
/// Links are dispatched only while the page's depth is below `max_depth`,
/// only when they fall inside the page's site scope, and only the first
/// time the metadata store sees them.
pub struct Parse {
    pub dispatch_links: bool,
    pub max_depth: u32,
}

#[async_trait]
impl Stage for Parse {
    fn name(&self) -> &str {
        "parse"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let page = ctx.require_page()?;
        if !page.is_html() {
            trace!(task_id = %ctx.task_id(), "Skipping link extraction for non-html page");
            return Ok(Flow::Continue);
        }

        let base = match Url::parse(&page.final_url) {
            Ok(base) => base,
            Err(_) => ctx.require_url()?.clone(),
        };
        let links = extract_links(&String::from_utf8_lossy(&page.body), &base);
        let depth = ctx.require_record()?.depth;

        let mut dispatched = 0;
        if self.dispatch_links && depth < self.max_depth {
            let env = ctx.env();
            let metadata = Arc::clone(&env.metadata);
            let queue = Arc::clone(&env.queue);
            let channel = env.config.fetch_channel.clone();

            for link in &links {
                let in_scope = match (&ctx.site, Url::parse(link)) {
                    (Some(site), Ok(url)) => site.contains(&url),
                    _ => false,
                };
                if !in_scope {
                    continue;
                }
                if !metadata
                    .insert_if_absent(CrawlRecord::new(link.clone(), depth + 1))
                    .await?
                {
                    continue;
                }
                // Every recorded link must also be queued
                if let Err(e) = queue.push(&channel, link.clone()).await {
                    if let Err(store_err) = metadata.remove(link).await {
                        warn!(%link, error = %store_err, "Failed to forget undispatched link");
                    }
                    return Err(e.into());
                }
                dispatched += 1;
            }
        }

        debug!(
            task_id = %ctx.task_id(),
            found = links.len(),
            dispatched,
            depth,
            "Parsed page"
        );
        ctx.links = links;
        ctx.dispatched = dispatched;
        Ok(Flow::Continue)
    }
}
