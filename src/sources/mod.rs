// src/sources/mod.rs
// Review source contract plus the filter/render steps both sources share.

pub mod app_store;
pub mod play_store;

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ResolvedApp;
use crate::message::RenderMessage;
use crate::review::{AppMetadata, FetchOutcome, Review};

/// One review source. Implementations fetch everything currently visible
/// for `app`, drop what `seen` already contains and return the remainder
/// rendered, oldest first.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_new(&self, app: &ResolvedApp, seen: &[String]) -> Result<FetchOutcome>;

    /// Human-readable source name for logs.
    fn name(&self) -> &'static str;
}

/// Drop reviews whose id was already published, and repeats of an id within
/// this batch (first occurrence wins). Order is preserved.
pub(crate) fn filter_new(reviews: Vec<Review>, seen: &[String]) -> Vec<Review> {
    let seen: HashSet<&str> = seen.iter().map(String::as_str).collect();
    let mut picked: HashSet<String> = HashSet::new();
    reviews
        .into_iter()
        .filter(|review| !seen.contains(review.id.as_str()) && picked.insert(review.id.clone()))
        .collect()
}

/// Render the filtered reviews into an outcome, `new_ids[i]` matching
/// `messages[i]`. The app's renderer override wins over the store default.
pub(crate) fn render_outcome(
    reviews: Vec<Review>,
    meta: &AppMetadata,
    app: &ResolvedApp,
    default: &dyn RenderMessage,
) -> FetchOutcome {
    let renderer: &dyn RenderMessage = match &app.renderer {
        Some(custom) => custom.as_ref(),
        None => default,
    };
    let mut new_ids = Vec::with_capacity(reviews.len());
    let mut messages = Vec::with_capacity(reviews.len());
    for review in &reviews {
        new_ids.push(review.id.clone());
        messages.push(renderer.render(review, meta, app));
    }
    FetchOutcome { new_ids, messages }
}
