// src/review.rs
use serde::{Deserialize, Serialize};

use crate::message::MessagePayload;

/// One user review, normalized across both stores. Identity is `id` alone:
/// two reviews with the same id are the same review even when the remaining
/// fields drifted between fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Review {
    pub id: String,
    /// Star rating as the store reported it. -1 (App Store) or 0 (Play
    /// Store) when the entry carried none.
    pub rating: i32,
    /// Always empty for Play Store reviews; the feed has no title field.
    pub title: String,
    pub text: String,
    pub author: String,
    pub link: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Android API level, not a marketing version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Store-side application metadata, looked up once per app per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMetadata {
    pub name: String,
    pub icon: String,
    pub link: String,
}

/// Per-application fetch result: the review ids to merge into the published
/// index plus the rendered messages for those same reviews. `messages[i]`
/// belongs to `new_ids[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub new_ids: Vec<String>,
    pub messages: Vec<MessagePayload>,
}

impl FetchOutcome {
    pub fn is_empty(&self) -> bool {
        self.new_ids.is_empty()
    }
}
