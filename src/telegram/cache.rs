//! Short-lived result cache for channel posts.
//!
//! Entries are keyed by (channel, limit) and are fresh while
//! `now - stored_at < window`, measured with the injected [`Clock`]. Stale
//! entries read as absent and are overwritten by the next successful fetch.
//! The moka cache underneath bounds the entry count and evicts entries that
//! nobody refreshes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;

use crate::config::{CacheConfig, CACHE_TTL_BACKSTOP_MULTIPLIER};

use super::clock::Clock;
use super::PostRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub channel: String,
    pub limit: usize,
}

impl CacheKey {
    pub fn new(channel: &str, limit: usize) -> Self {
        Self {
            channel: channel.to_string(),
            limit,
        }
    }
}

#[derive(Clone)]
struct CacheEntry {
    stored_at: DateTime<Utc>,
    posts: Arc<Vec<PostRecord>>,
}

#[derive(Clone)]
pub struct ResultCache {
    entries: Cache<CacheKey, CacheEntry>,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(
                config.posts_ttl_seconds * CACHE_TTL_BACKSTOP_MULTIPLIER,
            ))
            .build();

        Self {
            entries,
            window: chrono::Duration::seconds(config.posts_ttl_seconds as i64),
            clock,
        }
    }

    /// Return the cached posts if the entry is still fresh.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<PostRecord>> {
        let entry = self.entries.get(key).await?;
        let age = self.clock.now() - entry.stored_at;
        if age < self.window {
            Some(entry.posts.as_ref().clone())
        } else {
            None
        }
    }

    /// Store posts under `key`, stamped with the current time.
    pub async fn put(&self, key: CacheKey, posts: Vec<PostRecord>) {
        let entry = CacheEntry {
            stored_at: self.clock.now(),
            posts: Arc::new(posts),
        };
        self.entries.insert(key, entry).await;
    }
}
