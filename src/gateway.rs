use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::FetchFailurePolicy;
use crate::discord::{OutboundMessage, RelaySink};
use crate::format::{self, MediaKind};
use crate::identity::IdentityResolver;
use crate::line::{self, Content, EventKind, InboundEvent, Message, SourceApi};

/// What happened to a single inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a message event.
    Ignored,
    /// A message type the relay does not handle.
    Unsupported,
    /// Media could not be downloaded and the policy is to skip it. Media over
    /// the size limit is not "unavailable"; it gets a size notice instead.
    MediaUnavailable,
    /// A post was attempted; `delivered` is the webhook result.
    Posted { delivered: bool },
}

pub struct Gateway {
    pub resolver: IdentityResolver,
    source: Arc<dyn SourceApi>,
    sink: Arc<dyn RelaySink>,
    max_file_size: usize,
    on_fetch_failure: FetchFailurePolicy,
}

impl Gateway {
    pub fn new(
        resolver: IdentityResolver,
        source: Arc<dyn SourceApi>,
        sink: Arc<dyn RelaySink>,
        max_file_size: usize,
    ) -> Self {
        Self {
            resolver,
            source,
            sink,
            max_file_size,
            on_fetch_failure: FetchFailurePolicy::default(),
        }
    }

    pub fn with_fetch_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.on_fetch_failure = policy;
        self
    }

    /// Relay every event in a webhook body, in order.
    ///
    /// Never fails: an unreadable body or a malformed event is logged and
    /// skipped, since LINE expects an acknowledgment regardless.
    pub async fn handle_body(&self, body: &[u8]) -> Vec<Outcome> {
        let events = match line::parse_events(body) {
            Ok(events) => events,
            Err(e) => {
                warn!("Ignoring unreadable webhook body: {e}");
                return Vec::new();
            }
        };

        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            match event {
                Ok(event) => outcomes.push(self.handle_event(event).await),
                Err(e) => warn!("Skipping event: {e}"),
            }
        }
        outcomes
    }

    /// Core routing: inbound event → display name → formatted post → webhook.
    pub async fn handle_event(&self, event: InboundEvent) -> Outcome {
        let message = match event.kind {
            EventKind::Message(message) => message,
            EventKind::Other(kind) => {
                debug!("Ignoring {kind} event from {}", event.sender_id);
                return Outcome::Ignored;
            }
        };

        info!(
            "{} message from {} ({})",
            message.type_name(),
            event.sender_id,
            event.source_kind
        );

        let outbound = match message {
            Message::Text { text } => {
                let name = self.resolver.resolve(&event.sender_id).await;
                format::text_post(&name, &text)
            }
            Message::Sticker { sticker_id } => {
                let name = self.resolver.resolve(&event.sender_id).await;
                format::sticker_post(&name, &sticker_id)
            }
            Message::Image { id } => {
                match self.media(MediaKind::Image, &event.sender_id, &id).await {
                    Some(msg) => msg,
                    None => return Outcome::MediaUnavailable,
                }
            }
            Message::Video { id } => {
                match self.media(MediaKind::Video, &event.sender_id, &id).await {
                    Some(msg) => msg,
                    None => return Outcome::MediaUnavailable,
                }
            }
            Message::Unsupported => {
                debug!("Dropping unsupported message from {}", event.sender_id);
                return Outcome::Unsupported;
            }
        };

        let delivered = self.sink.post(&outbound).await;
        Outcome::Posted { delivered }
    }

    async fn media(
        &self,
        kind: MediaKind,
        sender_id: &str,
        message_id: &str,
    ) -> Option<OutboundMessage> {
        let content = self.fetch_content(message_id).await;
        if content.is_none() && self.on_fetch_failure == FetchFailurePolicy::Skip {
            return None;
        }

        let name = self.resolver.resolve(sender_id).await;
        Some(match content {
            Some(Content::Bytes(bytes)) => {
                format::media_post(kind, &name, message_id, bytes, self.max_file_size)
            }
            Some(Content::TooLarge) => format::size_rejected_post(kind, &name),
            None => format::fetch_failed_post(kind, &name),
        })
    }

    /// `None` when the content could not be downloaded.
    async fn fetch_content(&self, message_id: &str) -> Option<Content> {
        match self.source.content(message_id, self.max_file_size).await {
            Ok(Content::Bytes(bytes)) => {
                debug!("Fetched {} bytes for message {message_id}", bytes.len());
                Some(Content::Bytes(bytes))
            }
            Ok(Content::TooLarge) => {
                info!(
                    "Content for message {message_id} is over {} bytes, not downloading",
                    self.max_file_size
                );
                Some(Content::TooLarge)
            }
            Err(e) => {
                error!("Failed to fetch content for message {message_id}: {e}");
                None
            }
        }
    }
}
