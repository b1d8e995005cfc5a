//! Durable storage for the published-review index. The pipeline only sees
//! the `IndexStore` trait; the file-backed default lives here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::index::PublishedIndex;

pub const ENV_STATE_PATH: &str = "REVIEW_STATE_PATH";
pub const DEFAULT_STATE_PATH: &str = "published_reviews.json";

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Last persisted index. Missing or unreadable state yields an empty
    /// index, never an error; worst case the next run re-notifies.
    async fn retrieve(&self) -> PublishedIndex;

    async fn persist(&self, index: &PublishedIndex) -> Result<()>;
}

/// JSON file store, the default for the runner binary.
pub struct FileIndexStore {
    path: PathBuf,
}

impl FileIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path from $REVIEW_STATE_PATH, falling back to published_reviews.json
    /// in the working directory.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_STATE_PATH).unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IndexStore for FileIndexStore {
    async fn retrieve(&self) -> PublishedIndex {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %self.path.display(),
                    error = ?e,
                    "published index unreadable; starting empty"
                );
                PublishedIndex::new()
            }),
            Err(_) => PublishedIndex::new(),
        }
    }

    async fn persist(&self, index: &PublishedIndex) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating state dir {}", parent.display()))?;
            }
        }
        let raw = serde_json::to_string(index).context("serializing published index")?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing published index to {}", self.path.display()))?;
        Ok(())
    }
}
