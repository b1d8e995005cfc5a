//! The published-review index: which review ids have already been sent out,
//! per application, most recent first. This is the only state that survives
//! between runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Serialized transparently, so the on-disk JSON shape stays
/// `{ "<app id>": ["<review id>", ...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublishedIndex {
    apps: BTreeMap<String, Vec<String>>,
}

impl PublishedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids already published for `app_id`, most recent first. Empty for an
    /// app seen for the first time.
    pub fn seen_for(&self, app_id: &str) -> &[String] {
        self.apps.get(app_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Merge one run's new ids for `app_id`.
    ///
    /// `new_ids` arrive oldest-first (fetch order), so they are prepended in
    /// reverse to keep the sequence most-recent-first. Ids already present
    /// in the sequence, or repeated within `new_ids`, are skipped; the
    /// sequence is then truncated to `limit` entries keeping the front.
    pub fn merge(&mut self, app_id: &str, new_ids: &[String], limit: Option<usize>) {
        let entry = self.apps.entry(app_id.to_string()).or_default();
        let old = std::mem::take(entry);

        let mut merged = Vec::with_capacity(new_ids.len() + old.len());
        for id in new_ids.iter().rev() {
            if !merged.contains(id) {
                merged.push(id.clone());
            }
        }
        for id in old {
            if !merged.contains(&id) {
                merged.push(id);
            }
        }
        if let Some(cap) = limit {
            merged.truncate(cap);
        }
        *entry = merged;
    }
}
