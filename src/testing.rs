//! In-process fakes for the LINE and Discord seams, plus a log capture.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::subscriber::DefaultGuard;

use crate::discord::{OutboundMessage, RelaySink};
use crate::error::{RelayError, Result};
use crate::line::{Content, Profile, SourceApi};

/// Profiles answer by user id; unknown ids fail like an HTTP 500.
#[derive(Default)]
pub struct FakeLine {
    pub profiles: HashMap<String, Option<String>>,
    pub content: HashMap<String, Vec<u8>>,
    profile_calls: AtomicUsize,
}

impl FakeLine {
    pub fn with_profile(mut self, user_id: &str, display_name: Option<&str>) -> Self {
        self.profiles
            .insert(user_id.to_string(), display_name.map(str::to_string));
        self
    }

    pub fn with_content(mut self, message_id: &str, bytes: Vec<u8>) -> Self {
        self.content.insert(message_id.to_string(), bytes);
        self
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceApi for FakeLine {
    async fn profile(&self, user_id: &str) -> Result<Profile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        match self.profiles.get(user_id) {
            Some(display_name) => Ok(Profile {
                display_name: display_name.clone(),
            }),
            None => Err(RelayError::Line(
                "profile returned 500 Internal Server Error".into(),
            )),
        }
    }

    async fn content(&self, message_id: &str, max_bytes: usize) -> Result<Content> {
        match self.content.get(message_id) {
            Some(bytes) if bytes.len() > max_bytes => Ok(Content::TooLarge),
            Some(bytes) => Ok(Content::Bytes(Bytes::from(bytes.clone()))),
            None => Err(RelayError::Line("content returned 404 Not Found".into())),
        }
    }
}

/// Records every post and answers with a fixed delivery result.
pub struct RecordingSink {
    delivered: bool,
    posts: Mutex<Vec<OutboundMessage>>,
}

impl RecordingSink {
    pub fn new(delivered: bool) -> Arc<Self> {
        Arc::new(Self {
            delivered,
            posts: Mutex::new(Vec::new()),
        })
    }

    pub fn posts(&self) -> Vec<OutboundMessage> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelaySink for RecordingSink {
    async fn post(&self, message: &OutboundMessage) -> bool {
        self.posts.lock().unwrap().push(message.clone());
        self.delivered
    }
}

/// Collects formatted log output for the current thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Route this thread's events into the capture until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
