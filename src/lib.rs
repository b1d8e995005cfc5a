// src/lib.rs
// Public library surface for the runner binaries, integration tests and
// embedding in other schedulers.

pub mod config;
pub mod index;
pub mod message;
pub mod notify;
pub mod pipeline;
pub mod review;
pub mod sources;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::{Config, FileConfig, ResolvedApp, SourceParams, StoreKind};
pub use crate::index::PublishedIndex;
pub use crate::message::{AppStoreMessage, MessagePayload, PlayStoreMessage, RenderMessage, Tone};
pub use crate::notify::{MessageSink, SlackWebhookSink};
pub use crate::pipeline::{ReviewPipeline, RunSummary};
pub use crate::review::{AppMetadata, FetchOutcome, Review};
pub use crate::sources::ReviewSource;
pub use crate::store::{FileIndexStore, IndexStore};
