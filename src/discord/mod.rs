pub mod webhook;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

pub use webhook::DiscordWebhook;

/// What gets posted to the Discord webhook for one LINE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text { content: String },
    Embed { content: String, image_url: String },
    File { content: String, filename: String, bytes: Bytes },
    /// Stands in for `File` when the payload is over the upload limit.
    SizeRejected { content: String },
}

impl OutboundMessage {
    pub fn content(&self) -> &str {
        match self {
            OutboundMessage::Text { content }
            | OutboundMessage::Embed { content, .. }
            | OutboundMessage::File { content, .. }
            | OutboundMessage::SizeRejected { content } => content,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookBody<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed<'a>>>,
}

impl<'a> WebhookBody<'a> {
    pub fn text(content: &'a str) -> Self {
        Self {
            content,
            embeds: None,
        }
    }

    pub fn with_image(content: &'a str, url: &'a str) -> Self {
        Self {
            content,
            embeds: Some(vec![Embed {
                image: EmbedImage { url },
            }]),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Embed<'a> {
    pub image: EmbedImage<'a>,
}

#[derive(Debug, Serialize)]
pub struct EmbedImage<'a> {
    pub url: &'a str,
}

/// Destination for formatted messages. Delivery is best effort: a failed post
/// is logged by the implementation and reported as `false`.
#[async_trait]
pub trait RelaySink: Send + Sync {
    async fn post(&self, message: &OutboundMessage) -> bool;
}
