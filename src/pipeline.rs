// src/pipeline.rs
// Run orchestration: fetch every configured app, merge the index, deliver
// one batch, persist.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::config::{Config, ResolvedApp, StoreKind};
use crate::message::MessagePayload;
use crate::notify::MessageSink;
use crate::sources::app_store::AppStoreSource;
use crate::sources::play_store::PlayStoreSource;
use crate::sources::ReviewSource;
use crate::store::IndexStore;

/// One-time metrics registration (so series are described once a recorder
/// is installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("reviews_fetched_total", "Reviews fetched from the stores.");
        describe_counter!(
            "reviews_new_total",
            "Reviews surviving the published-index filter."
        );
        describe_counter!(
            "reviews_suppressed_total",
            "Reviews dropped as already published."
        );
        describe_counter!(
            "review_page_errors_total",
            "Page or bulk fetches that degraded to an empty result."
        );
        describe_histogram!("review_fetch_ms", "Per-app fetch time in milliseconds.");
        describe_gauge!(
            "review_run_last_ts",
            "Unix timestamp of the last completed run."
        );
    });
}

/// What one run did, for the caller's log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub apps: usize,
    pub new_reviews: usize,
    pub delivered: usize,
}

pub struct ReviewPipeline {
    app_store: Arc<dyn ReviewSource>,
    play_store: Arc<dyn ReviewSource>,
}

impl ReviewPipeline {
    pub fn new() -> Self {
        Self::with_sources(
            Arc::new(AppStoreSource::new()),
            Arc::new(PlayStoreSource::new()),
        )
    }

    /// Inject alternative sources. Tests use this to run against canned
    /// outcomes.
    pub fn with_sources(
        app_store: Arc<dyn ReviewSource>,
        play_store: Arc<dyn ReviewSource>,
    ) -> Self {
        Self {
            app_store,
            play_store,
        }
    }

    fn source_for(&self, app: &ResolvedApp) -> &Arc<dyn ReviewSource> {
        match app.kind() {
            StoreKind::AppStore => &self.app_store,
            StoreKind::PlayStore => &self.play_store,
        }
    }

    /// One full run.
    ///
    /// All apps fetch in parallel against the same retrieved index; one
    /// failing app aborts the run before anything is delivered or
    /// persisted. Delivery comes before persistence, so dying in between
    /// re-notifies on the next run instead of losing reviews.
    pub async fn run(
        &self,
        cfg: &Config,
        store: &dyn IndexStore,
        sink: &dyn MessageSink,
    ) -> Result<RunSummary> {
        ensure_metrics_described();

        let mut index = store.retrieve().await;

        let fetches: Vec<_> = cfg
            .apps
            .iter()
            .map(|app| {
                let source = Arc::clone(self.source_for(app));
                let seen = index.seen_for(&app.id).to_vec();
                async move {
                    source
                        .fetch_new(app, &seen)
                        .await
                        .with_context(|| format!("fetching reviews for app {}", app.id))
                }
            })
            .collect();
        let outcomes = try_join_all(fetches).await?;

        let mut batch: Vec<MessagePayload> = Vec::new();
        let mut new_reviews = 0;
        for (app, outcome) in cfg.apps.iter().zip(outcomes) {
            new_reviews += outcome.new_ids.len();
            index.merge(&app.id, &outcome.new_ids, cfg.review_limit);
            batch.extend(outcome.messages);
        }

        sink.deliver(&batch)
            .await
            .context("delivering message batch")?;
        store
            .persist(&index)
            .await
            .context("persisting published index")?;

        gauge!("review_run_last_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

        Ok(RunSummary {
            apps: cfg.apps.len(),
            new_reviews,
            delivered: batch.len(),
        })
    }
}

impl Default for ReviewPipeline {
    fn default() -> Self {
        Self::new()
    }
}
