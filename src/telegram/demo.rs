//! Deterministic synthetic posts used when real channel data is unavailable.

use chrono::{DateTime, Duration, Utc};

use crate::config::{
    DEMO_COMMENTS_BASE, DEMO_COMMENTS_STEP, DEMO_IMAGE_URLS, DEMO_LIKES_BASE, DEMO_LIKES_STEP,
    DEMO_POST_COUNT, DEMO_VIEWS_BASE, DEMO_VIEWS_STEP,
};

use super::{post_url, PostRecord, PostSource};

/// Build `min(limit, 3)` demo posts for `channel`, newest first relative to `now`.
pub fn demo_posts(channel: &str, limit: usize, now: DateTime<Utc>) -> Vec<PostRecord> {
    (0..limit.min(DEMO_POST_COUNT))
        .map(|i| {
            let n = i as u64;
            let message_id = (i + 1) as i64;
            PostRecord {
                id: format!("{}_demo_{}", channel, message_id),
                channel: channel.to_string(),
                message_id,
                text: format!("Demo post from {} #{} - testing interface", channel, message_id),
                views: DEMO_VIEWS_BASE - n * DEMO_VIEWS_STEP,
                likes: DEMO_LIKES_BASE - n * DEMO_LIKES_STEP,
                comments: DEMO_COMMENTS_BASE - n * DEMO_COMMENTS_STEP,
                date: (now - Duration::hours(i as i64)).to_rfc3339(),
                media_url: DEMO_IMAGE_URLS[i % DEMO_IMAGE_URLS.len()].to_string(),
                post_url: post_url(channel, message_id),
                source: PostSource::Demo,
            }
        })
        .collect()
}
