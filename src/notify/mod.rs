// src/notify/mod.rs
pub mod slack;

use anyhow::Result;
use async_trait::async_trait;

use crate::message::MessagePayload;

pub use slack::SlackWebhookSink;

/// Delivery endpoint for one run's rendered messages. `deliver` gets the
/// whole batch at once; implementations decide how to fan it out.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, batch: &[MessagePayload]) -> Result<()>;
}
