//! Telegram channel access: connection management, post retrieval and caching.
//!
//! This module contains the data types shared by the backend seam and the HTTP
//! layer, and the normalization that turns a raw channel message into a
//! [`PostRecord`].
//!
//! Key re-exports:
//! - [`TelegramService`] - cached, single-connection post fetcher
//! - [`Connector`] / [`ChannelSession`] - backend capability implemented by
//!   [`WebPreviewConnector`] and by test fakes

mod backend;
mod cache;
mod clock;
mod connection;
mod demo;
mod error;
mod fetcher;
mod web;

pub use backend::{ChannelSession, Connector};
pub use cache::{CacheKey, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{ConnectionManager, ConnectionStatus};
pub use demo::demo_posts;
pub use error::{BackendError, FetchError};
pub use fetcher::{FetchSettings, TelegramService};
pub use web::{normalize_channel, WebPreviewConnector};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{
    EMPTY_TEXT_PLACEHOLDER, PLACEHOLDER_IMAGE_URL, POST_TEXT_LIMIT, TELEGRAM_POST_URL_BASE,
};

/// Where a post record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    /// Read from the channel
    Live,
    /// Synthesized because real data was unavailable
    Demo,
}

/// Normalized representation of one channel message, used uniformly for real
/// and synthetic data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    /// `<channel>_<message id>`
    pub id: String,
    pub channel: String,
    pub message_id: i64,
    /// Message text, at most [`POST_TEXT_LIMIT`] characters
    pub text: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    /// ISO 8601 timestamp
    pub date: String,
    /// Proxied photo path or a placeholder image URL
    pub media_url: String,
    pub post_url: String,
    pub source: PostSource,
}

/// Ordered posts for one channel.
pub type PostSet = Vec<PostRecord>;

impl PostRecord {
    /// Normalize a channel message into a live post record.
    pub fn from_message(channel: &str, message: &ChannelMessage) -> Self {
        let text = message
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(EMPTY_TEXT_PLACEHOLDER);

        let media_url = if message.photo.is_some() {
            photo_path(channel, message.id)
        } else {
            PLACEHOLDER_IMAGE_URL.to_string()
        };

        Self {
            id: format!("{}_{}", channel, message.id),
            channel: channel.to_string(),
            message_id: message.id,
            text: truncate_chars(text, POST_TEXT_LIMIT),
            views: message.views.unwrap_or(0),
            likes: message.reactions.unwrap_or(0),
            comments: message.replies.unwrap_or(0),
            date: message.date.to_rfc3339(),
            media_url,
            post_url: post_url(channel, message.id),
            source: PostSource::Live,
        }
    }
}

/// A resolved channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub username: String,
    pub title: String,
}

/// Location of a photo attached to a message, understood by the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub location: String,
}

/// Raw message as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub id: i64,
    pub text: Option<String>,
    pub views: Option<u64>,
    /// Total reaction count across all reaction kinds
    pub reactions: Option<u64>,
    /// Number of replies in the discussion thread
    pub replies: Option<u64>,
    pub date: DateTime<Utc>,
    pub photo: Option<PhotoRef>,
}

/// Downloaded image bytes.
#[derive(Debug, Clone)]
pub struct PhotoBytes {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Path of the photo proxy route for a message.
pub fn photo_path(channel: &str, message_id: i64) -> String {
    format!("/photo/{}/{}", channel, message_id)
}

/// Canonical public link to a post.
pub fn post_url(channel: &str, message_id: i64) -> String {
    format!("{}/{}/{}", TELEGRAM_POST_URL_BASE, channel, message_id)
}

/// Placeholder image for a photo that could not be served, varied per message.
pub fn placeholder_photo_url(base: &str, channel: &str, message_id: i64) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}seed={}_{}", base, separator, channel, message_id)
}

/// Truncate to at most `limit` characters without splitting a code point.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
