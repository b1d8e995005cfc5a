//! Review notifier binary entrypoint.
//!
//! Loads the app config, runs one fetch/deliver/persist cycle and exits.
//! Meant to be invoked from cron or a job scheduler.
//!
//! See `README.md` for quickstart and configuration.

use review_radar::{Config, FileIndexStore, ReviewPipeline, SlackWebhookSink};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("review_radar=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = Config::resolve(review_radar::config::load_default()?)?;
    let store = FileIndexStore::from_env();
    let sink = SlackWebhookSink::from_env();
    let pipeline = ReviewPipeline::new();

    let summary = pipeline.run(&cfg, &store, &sink).await?;
    tracing::info!(
        apps = summary.apps,
        new_reviews = summary.new_reviews,
        delivered = summary.delivered,
        "review run complete"
    );
    Ok(())
}
