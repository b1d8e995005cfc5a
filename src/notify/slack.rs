// src/notify/slack.rs
use anyhow::{Context, Result};
use futures::future::try_join_all;
use reqwest::Client;
use serde::Serialize;

use super::MessageSink;
use crate::message::{MessagePayload, Tone};

pub const ENV_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";

/// Posts one attachment-style webhook call per message. With no webhook URL
/// configured the sink is disabled and delivery is a no-op.
pub struct SlackWebhookSink {
    webhook_url: Option<String>,
    client: Client,
}

impl SlackWebhookSink {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var(ENV_WEBHOOK_URL).ok(),
            client: Client::new(),
        }
    }

    /// Optional builder for tests/tools
    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
        }
    }
}

#[derive(Serialize)]
struct SlackAttachment<'a> {
    mrkdwn_in: [&'static str; 4],
    color: &'static str,
    author_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb_url: Option<&'a str>,
    title: &'a str,
    text: &'a str,
    footer: &'a str,
}

#[derive(Serialize)]
struct SlackWebhookBody<'a> {
    attachments: [SlackAttachment<'a>; 1],
}

fn slack_color(tone: Tone) -> &'static str {
    match tone {
        Tone::Positive => "good",
        Tone::Neutral => "warning",
        Tone::Negative => "danger",
    }
}

fn webhook_body(payload: &MessagePayload) -> SlackWebhookBody<'_> {
    SlackWebhookBody {
        attachments: [SlackAttachment {
            mrkdwn_in: ["text", "pretext", "title", "footer"],
            color: slack_color(payload.color),
            author_name: &payload.author_name,
            thumb_url: payload.thumb_url.as_deref(),
            title: &payload.title,
            text: &payload.text,
            footer: &payload.footer,
        }],
    }
}

#[async_trait::async_trait]
impl MessageSink for SlackWebhookSink {
    async fn deliver(&self, batch: &[MessagePayload]) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Slack disabled (no SLACK_WEBHOOK_URL)");
            return Ok(());
        };

        let posts = batch.iter().map(|payload| async move {
            self.client
                .post(url)
                .json(&webhook_body(payload))
                .send()
                .await
                .context("slack post")?
                .error_for_status()
                .context("slack non-2xx")?;
            Ok::<(), anyhow::Error>(())
        });
        try_join_all(posts).await?;
        Ok(())
    }
}
