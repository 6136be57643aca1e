pub mod client;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::{RelayError, Result};

pub use client::LineClient;

/// Sender id used when the event source carries no `userId`.
pub const UNKNOWN_SENDER: &str = "(unknown)";

/// Where an event originated. Logged only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    User,
    Group,
    Room,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SourceKind::User => "user",
            SourceKind::Group => "group",
            SourceKind::Room => "room",
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawSource {
    User {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
    Group {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
    Room {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
}

/// A LINE message, one variant per supported `message.type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        #[serde(default)]
        text: String,
    },
    Sticker {
        #[serde(rename = "stickerId")]
        sticker_id: String,
    },
    Image {
        id: String,
    },
    Video {
        id: String,
    },
    #[serde(other)]
    Unsupported,
}

impl Message {
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Sticker { .. } => "sticker",
            Message::Image { .. } => "image",
            Message::Video { .. } => "video",
            Message::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message(Message),
    /// Any non-message event (`follow`, `join`, `postback`, ...).
    Other(String),
}

/// One webhook event, validated once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub source_kind: SourceKind,
    pub sender_id: String,
    pub kind: EventKind,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    source: RawSource,
    #[serde(default)]
    message: Option<Message>,
}

impl InboundEvent {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawEvent = serde_json::from_value(value)
            .map_err(|e| RelayError::Event(format!("Malformed event: {e}")))?;

        let (source_kind, user_id) = match raw.source {
            RawSource::User { user_id } => (SourceKind::User, user_id),
            RawSource::Group { user_id } => (SourceKind::Group, user_id),
            RawSource::Room { user_id } => (SourceKind::Room, user_id),
        };

        let kind = if raw.kind == "message" {
            let message = raw
                .message
                .ok_or_else(|| RelayError::Event("Message event without a message".to_string()))?;
            EventKind::Message(message)
        } else {
            EventKind::Other(raw.kind)
        };

        Ok(Self {
            source_kind,
            sender_id: user_id.unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            kind,
        })
    }
}

/// Parse a webhook body into its events.
///
/// Elements that fail validation are returned as errors in place so the
/// caller can log and skip them without losing the rest of the batch.
pub fn parse_events(body: &[u8]) -> Result<Vec<Result<InboundEvent>>> {
    #[derive(Deserialize)]
    struct Envelope {
        events: Vec<serde_json::Value>,
    }

    let envelope: Envelope = serde_json::from_slice(body)?;
    Ok(envelope
        .events
        .into_iter()
        .map(InboundEvent::from_value)
        .collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Result of a bounded media download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Bytes(Bytes),
    /// The payload exceeds the requested limit; the download was abandoned.
    TooLarge,
}

/// The LINE Messaging API calls the relay depends on.
#[async_trait]
pub trait SourceApi: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Profile>;

    /// Download message media, giving up as soon as it is known to be
    /// larger than `max_bytes`.
    async fn content(&self, message_id: &str, max_bytes: usize) -> Result<Content>;
}
