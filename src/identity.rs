use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::line::SourceApi;

/// Number of leading sender-id characters used for overrides and placeholders.
pub const PREFIX_LEN: usize = 6;

pub fn sender_prefix(sender_id: &str) -> &str {
    match sender_id.char_indices().nth(PREFIX_LEN) {
        Some((idx, _)) => &sender_id[..idx],
        None => sender_id,
    }
}

/// Resolved display names keyed by sender id. Bounded LRU: once `capacity`
/// senders are cached, the least recently used one is evicted. A capacity of
/// `0` disables the bound and entries live for the whole process.
pub struct IdentityCache {
    entries: Mutex<LruCache<String, String>>,
}

impl IdentityCache {
    /// A `capacity` of zero keeps every entry.
    pub fn new(capacity: usize) -> Self {
        let cache = match NonZeroUsize::new(capacity) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(cache),
        }
    }

    pub async fn get(&self, sender_id: &str) -> Option<String> {
        self.entries.lock().await.get(sender_id).cloned()
    }

    pub async fn insert(&self, sender_id: &str, name: &str) {
        self.entries
            .lock()
            .await
            .put(sender_id.to_string(), name.to_string());
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Maps LINE user ids to the names shown on Discord.
///
/// Order of precedence: cached value, static prefix override, LINE profile
/// lookup. Resolution never fails; lookup errors degrade to a placeholder
/// built from the id prefix, which is not cached so the next event retries.
pub struct IdentityResolver {
    source: Arc<dyn SourceApi>,
    overrides: HashMap<String, String>,
    cache: IdentityCache,
}

impl IdentityResolver {
    pub fn new(
        source: Arc<dyn SourceApi>,
        overrides: HashMap<String, String>,
        cache: IdentityCache,
    ) -> Self {
        Self {
            source,
            overrides,
            cache,
        }
    }

    pub async fn resolve(&self, sender_id: &str) -> String {
        if let Some(name) = self.cache.get(sender_id).await {
            debug!("Display name cache hit for {sender_id}");
            return name;
        }

        let prefix = sender_prefix(sender_id);
        if let Some(name) = self.overrides.get(prefix) {
            self.cache.insert(sender_id, name).await;
            return name.clone();
        }

        match self.source.profile(sender_id).await {
            Ok(profile) => {
                let name = profile
                    .display_name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("(unknown user {prefix})"));
                self.cache.insert(sender_id, &name).await;
                name
            }
            Err(e) => {
                warn!("Profile lookup failed for {sender_id}: {e}");
                format!("(user {prefix})")
            }
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }
}
