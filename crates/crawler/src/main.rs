use std::sync::Arc;

use anyhow::{Context, Result};
use crawler::fetch::HttpFetcher;
use crawler::queue::{InMemoryTaskQueue, TaskQueue};
use crawler::telemetry::{init_tracing, TelemetryConfig};
use crawler::{CrawlerConfig, CrawlerEnv, CrawlerModule};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "info")
    // - CRAWLER_*: see CrawlerConfig::from_env
    // - CRAWLER_SEEDS: comma separated seed URLs, added to the command line ones
    init_tracing(TelemetryConfig::from_env());

    tracing::info!("crawler-worker starting...");

    let config = CrawlerConfig::from_env().context("Failed to load crawler configuration")?;
    let fetcher = HttpFetcher::new(config.fetch_timeout, &config.user_agent)
        .context("Failed to create HTTP client")?;

    let queue = Arc::new(InMemoryTaskQueue::new());
    let seeds = std::env::var("CRAWLER_SEEDS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .chain(std::env::args().skip(1))
        .collect::<Vec<_>>();
    for seed in &seeds {
        queue
            .push(&config.fetch_channel, seed.clone())
            .await
            .context("Failed to enqueue seed")?;
    }

    tracing::info!(
        seeds = seeds.len(),
        workers = config.worker_count,
        channel = %config.fetch_channel,
        "Seeds queued"
    );

    let channel = config.fetch_channel.clone();
    let env = CrawlerEnv::builder(config, Arc::new(fetcher))
        .with_queue(queue.clone())
        .build();

    let mut module = CrawlerModule::new();
    module
        .start(env)
        .await
        .context("Failed to start crawler")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Received shutdown signal");

    if module.is_running() {
        module.stop().await.context("Failed to stop crawler")?;
    }

    tracing::info!(pending = queue.len(&channel), "Crawler shutdown complete");
    Ok(())
}
