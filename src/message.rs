// src/message.rs
// Store-agnostic message payloads and the per-store formatters that fill
// them. A payload is what the delivery sinks serialize, nothing more.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::ResolvedApp;
use crate::review::{AppMetadata, Review};

/// Android API level to public release string, embedded at compile time.
static ANDROID_RELEASES: Lazy<HashMap<String, String>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../android_versions.json"))
        .expect("embedded android_versions.json is valid")
});

/// Release string for an Android API level, empty when unknown.
pub fn android_release(api_level: i64) -> &'static str {
    ANDROID_RELEASES
        .get(&api_level.to_string())
        .map(String::as_str)
        .unwrap_or("")
}

/// Coarse tone of a review, used by sinks to pick an accent color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
}

/// Tone bucket for a star rating. Unparseable sentinel ratings (-1, 0)
/// land in Negative.
pub fn tone_for(rating: i32) -> Tone {
    if rating >= 4 {
        Tone::Positive
    } else if rating >= 2 {
        Tone::Neutral
    } else {
        Tone::Negative
    }
}

/// Star strip for a rating, always five characters. Out-of-range ratings
/// render all-hollow.
pub fn stars(rating: i32) -> String {
    (0..5i32).map(|i| if i < rating { '★' } else { '☆' }).collect()
}

/// One rendered review, ready for a delivery sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub color: Tone,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    pub title: String,
    pub text: String,
    pub footer: String,
}

/// Turns a review plus its app context into a payload. Implemented per
/// store below; apps may swap in their own via config.
pub trait RenderMessage: Send + Sync {
    fn render(&self, review: &Review, meta: &AppMetadata, app: &ResolvedApp) -> MessagePayload;
}

fn thumb_for(meta: &AppMetadata, app: &ResolvedApp) -> Option<String> {
    if app.show_app_icon {
        Some(meta.icon.clone())
    } else {
        app.icon_override.clone()
    }
}

fn linked_footer(prefix: String, review_link: &str, app_name: &str, store_label: &str) -> String {
    if review_link.is_empty() {
        format!("{prefix} - {app_name}, {store_label}")
    } else {
        format!("{prefix} - <{review_link}|{app_name}, {store_label}>")
    }
}

/// Default App Store formatter.
pub struct AppStoreMessage;

impl RenderMessage for AppStoreMessage {
    fn render(&self, review: &Review, meta: &AppMetadata, app: &ResolvedApp) -> MessagePayload {
        let mut title = stars(review.rating);
        if !review.title.is_empty() {
            title.push_str(&format!(" – {}", review.title));
        }

        let mut footer = String::new();
        if !review.version.is_empty() {
            footer.push_str(&format!(" for v{}", review.version));
        }
        let region = review.region.as_deref().unwrap_or("");
        let store_label = format!("App Store ({region})");

        MessagePayload {
            color: tone_for(review.rating),
            author_name: review.author.clone(),
            thumb_url: thumb_for(meta, app),
            title,
            text: format!("{}\n", review.text),
            footer: linked_footer(footer, &review.link, &meta.name, &store_label),
        }
    }
}

/// Default Play Store formatter. Adds the Android release and device model
/// when the review carries them.
pub struct PlayStoreMessage;

impl RenderMessage for PlayStoreMessage {
    fn render(&self, review: &Review, meta: &AppMetadata, app: &ResolvedApp) -> MessagePayload {
        let mut footer = String::new();
        if !review.version.is_empty() {
            footer.push_str(&format!(
                " for v{} ({})",
                review.version,
                review.version_code.unwrap_or(0)
            ));
        }
        if let Some(api_level) = review.os_version {
            footer.push_str(&format!(" Android {}", android_release(api_level)));
        }
        if let Some(device) = &review.device {
            footer.push_str(&format!(", {device}"));
        }

        MessagePayload {
            color: tone_for(review.rating),
            author_name: review.author.clone(),
            thumb_url: thumb_for(meta, app),
            title: stars(review.rating),
            text: format!("{}\n", review.text),
            footer: linked_footer(footer, &review.link, &meta.name, "Play Store"),
        }
    }
}
