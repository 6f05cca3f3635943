//! Category feed aggregation.
//!
//! A category names a fixed list of channels. The feed fetches every channel
//! concurrently, merges the posts, orders them by views and truncates to the
//! requested size.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::instrument;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::telegram::{PostRecord, TelegramService};

#[derive(Debug, Clone, Serialize)]
pub struct CategoryFeed {
    pub category: String,
    pub posts: Vec<PostRecord>,
    /// Merged post count before truncation
    pub total: usize,
}

#[derive(Clone)]
pub struct FeedService {
    config: Arc<AppConfig>,
    telegram: TelegramService,
}

impl FeedService {
    pub fn new(config: Arc<AppConfig>, telegram: TelegramService) -> Self {
        Self { config, telegram }
    }

    /// Clamp a requested limit to `1..=max_limit`, defaulting when absent.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        let feed = &self.config.feed;
        requested
            .unwrap_or(feed.default_limit)
            .clamp(1, feed.max_limit.max(1))
    }

    #[instrument(name = "feed.category", skip(self))]
    pub async fn category_feed(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<CategoryFeed, AppError> {
        let channels = self
            .config
            .feed
            .categories
            .get(category)
            .ok_or_else(|| AppError::UnknownCategory(category.to_string()))?;

        let limit = self.effective_limit(limit);
        let per_channel = (limit / channels.len().max(1)).max(1);

        let results = join_all(
            channels
                .iter()
                .map(|channel| self.telegram.fetch_posts(channel, per_channel)),
        )
        .await;

        let mut posts = Vec::new();
        let mut first_error = None;
        let mut failed = 0usize;
        for (channel, result) in channels.iter().zip(results) {
            match result {
                Ok(channel_posts) => posts.extend(channel_posts),
                Err(e) => {
                    tracing::warn!(%channel, category = e.category(), "Skipping channel");
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        if failed == channels.len() {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        // Stable sort keeps channel order among equal view counts
        posts.sort_by(|a, b| b.views.cmp(&a.views));
        let total = posts.len();
        posts.truncate(limit);

        tracing::info!(%category, total, returned = posts.len(), "Built category feed");
        Ok(CategoryFeed {
            category: category.to_string(),
            posts,
            total,
        })
    }
}
