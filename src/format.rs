//! Builds the Discord post for each LINE message type.
//!
//! Everything here is a pure function of its arguments.

use bytes::Bytes;

use crate::discord::OutboundMessage;

pub const STICKER_URL_BASE: &str = "https://stickershop.line-scdn.net/stickershop/v1/sticker";

const STICKER_LABEL: &str = "貼圖🧸";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "圖片🖼️",
            MediaKind::Video => "影片🎥",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

fn prefixed(display_name: &str, body: &str) -> String {
    format!("👤 {display_name}：{body}")
}

pub fn sticker_url(sticker_id: &str) -> String {
    format!("{STICKER_URL_BASE}/{sticker_id}/ANDROID/sticker.png")
}

pub fn text_post(display_name: &str, text: &str) -> OutboundMessage {
    OutboundMessage::Text {
        content: prefixed(display_name, text),
    }
}

/// Discord fetches and previews the sticker image itself.
pub fn sticker_post(display_name: &str, sticker_id: &str) -> OutboundMessage {
    OutboundMessage::Embed {
        content: prefixed(display_name, STICKER_LABEL),
        image_url: sticker_url(sticker_id),
    }
}

/// Upload downloaded media, or a notice when it is over `max_file_size` bytes.
pub fn media_post(
    kind: MediaKind,
    display_name: &str,
    message_id: &str,
    bytes: Bytes,
    max_file_size: usize,
) -> OutboundMessage {
    if bytes.len() > max_file_size {
        return size_rejected_post(kind, display_name);
    }

    OutboundMessage::File {
        content: prefixed(display_name, kind.label()),
        filename: format!("{message_id}.{}", kind.extension()),
        bytes,
    }
}

/// Posted in place of media over the upload limit.
pub fn size_rejected_post(kind: MediaKind, display_name: &str) -> OutboundMessage {
    OutboundMessage::SizeRejected {
        content: prefixed(
            display_name,
            &format!("{}檔案太大啦~ (超過限制)", kind.label()),
        ),
    }
}

/// Posted in place of media that could not be downloaded, when enabled.
pub fn fetch_failed_post(kind: MediaKind, display_name: &str) -> OutboundMessage {
    OutboundMessage::Text {
        content: prefixed(display_name, &format!("{}無法取得", kind.label())),
    }
}
