// src/sources/app_store.rs
// App Store reviews via the public lookup + customer-review RSS-JSON feed,
// fetched per region and page.

use std::time::Instant;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::config::{ResolvedApp, SourceParams};
use crate::message::AppStoreMessage;
use crate::review::{AppMetadata, FetchOutcome, Review};
use crate::sources::{filter_new, render_outcome, ReviewSource};

const DEFAULT_BASE_URL: &str = "https://itunes.apple.com";

/// Every known storefront region code, embedded at compile time. Backs the
/// `regions = "all"` config keyword.
static ALL_REGIONS: Lazy<Vec<String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../appstore_regions.json"))
        .expect("embedded appstore_regions.json is valid")
});

pub fn all_regions() -> &'static [String] {
    &ALL_REGIONS
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResult {
    #[serde(default)]
    track_censored_name: String,
    #[serde(default)]
    artwork_url_100: String,
    #[serde(default)]
    track_view_url: String,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    feed: Feed,
}

#[derive(Debug, Deserialize)]
struct Feed {
    entry: Option<Vec<FeedEntry>>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    // Present only on the feed's app-information entry, not on reviews.
    #[serde(rename = "im:name")]
    im_name: Option<Label>,
    id: Option<Label>,
    title: Option<Label>,
    content: Option<Label>,
    author: Option<Author>,
    #[serde(rename = "im:version")]
    im_version: Option<Label>,
    #[serde(rename = "im:rating")]
    im_rating: Option<Label>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<Label>,
    uri: Option<Label>,
}

#[derive(Debug, Deserialize)]
struct Label {
    label: String,
}

fn is_review_entry(entry: &FeedEntry) -> bool {
    entry.im_name.is_none() && entry.id.is_some()
}

fn parse_entry(entry: &FeedEntry, region: &str) -> Review {
    let rating = entry
        .im_rating
        .as_ref()
        .and_then(|l| l.label.parse::<i32>().ok())
        .unwrap_or(-1);
    let (author, link) = match &entry.author {
        Some(author) => (
            author
                .name
                .as_ref()
                .map(|l| l.label.clone())
                .unwrap_or_default(),
            author
                .uri
                .as_ref()
                .map(|l| l.label.clone())
                .unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    };
    Review {
        id: entry.id.as_ref().map(|l| l.label.clone()).unwrap_or_default(),
        rating,
        title: entry
            .title
            .as_ref()
            .map(|l| l.label.clone())
            .unwrap_or_default(),
        text: entry
            .content
            .as_ref()
            .map(|l| l.label.clone())
            .unwrap_or_default(),
        author,
        link,
        version: entry
            .im_version
            .as_ref()
            .map(|l| l.label.clone())
            .unwrap_or_default(),
        version_code: None,
        device: None,
        os_version: None,
        region: Some(region.to_string()),
    }
}

pub struct AppStoreSource {
    base_url: String,
    client: reqwest::Client,
}

impl AppStoreSource {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the source at a different host. Tests use this with a local
    /// mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_metadata(&self, app_id: &str) -> Result<AppMetadata> {
        let url = format!("{}/lookup?id={}", self.base_url, app_id);
        let resp: LookupResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("app store lookup get()")?
            .error_for_status()
            .context("app store lookup status")?
            .json()
            .await
            .context("app store lookup decode")?;
        let Some(entry) = resp.results.into_iter().next() else {
            bail!("no store entry found for app {app_id}");
        };
        Ok(AppMetadata {
            name: entry.track_censored_name,
            icon: entry.artwork_url_100,
            link: entry.track_view_url,
        })
    }

    async fn fetch_region(&self, app: &ResolvedApp, region: &str, page_range: u32) -> Vec<Review> {
        let mut out = Vec::new();
        for page in 1..=page_range {
            out.extend(self.fetch_page(app, region, page).await);
        }
        out
    }

    /// One feed page. Failures degrade to an empty page so the other pages
    /// and regions still go through.
    async fn fetch_page(&self, app: &ResolvedApp, region: &str, page: u32) -> Vec<Review> {
        match self.try_fetch_page(&app.id, region, page).await {
            Ok(reviews) => reviews,
            Err(e) => {
                if app.verbose {
                    tracing::warn!(
                        app = %app.id,
                        region = %region,
                        page,
                        error = ?e,
                        "review page fetch failed; skipping page"
                    );
                }
                counter!("review_page_errors_total").increment(1);
                Vec::new()
            }
        }
    }

    async fn try_fetch_page(&self, app_id: &str, region: &str, page: u32) -> Result<Vec<Review>> {
        let url = format!(
            "{}/{}/rss/customerreviews/page={}/id={}/sortBy=mostRecent/json",
            self.base_url, region, page, app_id
        );
        let resp: FeedResponse = self
            .client
            .get(&url)
            .send()
            .await
            .context("app store feed get()")?
            .error_for_status()
            .context("app store feed status")?
            .json()
            .await
            .context("app store feed decode")?;

        let entries = resp.feed.entry.unwrap_or_default();
        let mut reviews: Vec<Review> = entries
            .iter()
            .filter(|e| is_review_entry(e))
            .map(|e| parse_entry(e, region))
            .collect();
        // Feed is most-recent-first; flip so each page reads oldest to newest.
        reviews.reverse();
        Ok(reviews)
    }
}

impl Default for AppStoreSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewSource for AppStoreSource {
    async fn fetch_new(&self, app: &ResolvedApp, seen: &[String]) -> Result<FetchOutcome> {
        let SourceParams::AppStore { regions, page_range } = &app.params else {
            bail!("app {} is not configured for the App Store", app.id);
        };
        // Resolve validates this, but `ResolvedApp` can be built by hand.
        if regions.is_empty() {
            bail!("app {}: at least one region must be configured", app.id);
        }

        let t0 = Instant::now();
        let meta = self.fetch_metadata(&app.id).await?;

        let fetches = regions
            .iter()
            .map(|region| self.fetch_region(app, region, *page_range));
        let fetched: Vec<Review> = join_all(fetches).await.into_iter().flatten().collect();

        histogram!("review_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("reviews_fetched_total").increment(fetched.len() as u64);

        let fetched_count = fetched.len();
        let fresh = filter_new(fetched, seen);
        counter!("reviews_suppressed_total").increment((fetched_count - fresh.len()) as u64);
        counter!("reviews_new_total").increment(fresh.len() as u64);

        if app.verbose {
            tracing::info!(
                app = %app.id,
                fetched = fetched_count,
                new = fresh.len(),
                "app store fetch complete"
            );
        }

        Ok(render_outcome(fresh, &meta, app, &AppStoreMessage))
    }

    fn name(&self) -> &'static str {
        "App Store"
    }
}
