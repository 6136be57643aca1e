use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::{debug, error, info};

use super::{OutboundMessage, RelaySink, WebhookBody};
use crate::error::{RelayError, Result};

pub struct DiscordWebhook {
    http: reqwest::Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Discord(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let req = match message {
            OutboundMessage::Text { content } | OutboundMessage::SizeRejected { content } => {
                self.http.post(&self.url).json(&WebhookBody::text(content))
            }
            OutboundMessage::Embed { content, image_url } => self
                .http
                .post(&self.url)
                .json(&WebhookBody::with_image(content, image_url)),
            OutboundMessage::File {
                content,
                filename,
                bytes,
            } => {
                // `Bytes` clones share the buffer.
                let part = Part::stream_with_length(bytes.clone(), bytes.len() as u64)
                    .file_name(filename.clone());
                let form = Form::new().text("content", content.clone()).part("file", part);
                self.http.post(&self.url).multipart(form)
            }
        };

        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(RelayError::Discord(format!("Webhook returned {status}: {body}")))
    }
}

#[async_trait]
impl RelaySink for DiscordWebhook {
    async fn post(&self, message: &OutboundMessage) -> bool {
        debug!("POST webhook: {}", message.content());
        match self.send(message).await {
            Ok(()) => {
                info!("Relayed to Discord: {}", message.content());
                true
            }
            Err(e) => {
                error!("Failed to relay to Discord: {e}");
                false
            }
        }
    }
}
