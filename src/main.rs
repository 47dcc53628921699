// src/main.rs
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use imas_news_watcher::{ChromeRenderer, LogSink, NewsWatcher, WatcherConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = WatcherConfig::load_default()?;
    // Fail fast when no browser is installed; that is a setup problem the
    // scheduler cannot retry away.
    let renderer = ChromeRenderer::new(&cfg)?;
    let watcher = Arc::new(NewsWatcher::new(cfg, renderer, LogSink));

    info!("news watcher started");
    let handle = watcher.spawn();

    tokio::signal::ctrl_c().await?;
    info!("shutting down, stopping poll loop");
    handle.abort();
    Ok(())
}
