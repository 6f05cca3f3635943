//! Cached post retrieval with demo fallback.
//!
//! `TelegramService` is the public face of the telegram module: it owns the
//! connection manager and the result cache, and decides whether a failed fetch
//! is substituted with demo records.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tracing::instrument;

use crate::config::{AppConfig, Credentials, TelegramSettings};

use super::backend::{ChannelSession, Connector};
use super::cache::{CacheKey, ResultCache};
use super::clock::Clock;
use super::connection::{ConnectionManager, ConnectionStatus};
use super::demo::demo_posts;
use super::error::FetchError;
use super::{ChannelHandle, PhotoBytes, PostRecord, PostSet};

/// Scan and fallback parameters
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Minimum views for a message to qualify
    pub min_views: u64,
    /// Messages scanned per requested post
    pub over_fetch_factor: usize,
    /// Timeout applied to every backend call
    pub request_timeout: Duration,
    /// Substitute demo records when a fetch fails
    pub demo_fallback: bool,
}

impl FetchSettings {
    pub fn from_config(settings: &TelegramSettings) -> Self {
        Self {
            min_views: settings.min_views,
            over_fetch_factor: settings.over_fetch_factor.max(1),
            request_timeout: Duration::from_secs(settings.request_timeout_seconds),
            demo_fallback: settings.demo_fallback,
        }
    }
}

#[derive(Clone)]
pub struct TelegramService {
    connection: Arc<ConnectionManager>,
    cache: ResultCache,
    clock: Arc<dyn Clock>,
    settings: FetchSettings,
}

impl TelegramService {
    pub fn new(
        config: &AppConfig,
        credentials: Credentials,
        connector: Arc<dyn Connector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let connection = ConnectionManager::new(
            credentials,
            connector,
            Duration::from_secs(config.telegram.connect_timeout_seconds),
        );

        Self {
            connection: Arc::new(connection),
            cache: ResultCache::new(&config.cache, clock.clone()),
            clock,
            settings: FetchSettings::from_config(&config.telegram),
        }
    }

    pub fn demo_fallback(&self) -> bool {
        self.settings.demo_fallback
    }

    pub fn has_credentials(&self) -> bool {
        self.connection.has_credentials()
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.connection.state().await
    }

    pub async fn ensure_connected(&self) -> bool {
        self.connection.ensure_connected().await
    }

    /// Synthetic records for `channel`, timestamped from the service clock.
    pub fn demo_posts(&self, channel: &str, limit: usize) -> PostSet {
        demo_posts(channel, limit, self.clock.now())
    }

    /// Fetch posts, substituting demo records on failure when the fallback is enabled.
    pub async fn fetch_posts(&self, channel: &str, limit: usize) -> Result<PostSet, FetchError> {
        match self.try_fetch_posts(channel, limit).await {
            Ok(posts) => Ok(posts),
            Err(e) if self.settings.demo_fallback => {
                tracing::warn!(
                    %channel,
                    category = e.category(),
                    error = %e,
                    "Serving demo posts"
                );
                Ok(self.demo_posts(channel, limit))
            }
            Err(e) => {
                tracing::error!(%channel, category = e.category(), error = %e, "Fetch failed");
                Err(e)
            }
        }
    }

    /// Fetch up to `limit` popular posts from `channel`, newest first.
    #[instrument(
        name = "telegram.service.fetch_posts",
        skip(self),
        fields(cached = false, scanned, duration_ms)
    )]
    pub async fn try_fetch_posts(&self, channel: &str, limit: usize) -> Result<PostSet, FetchError> {
        let start = Instant::now();
        let key = CacheKey::new(channel, limit);
        if let Some(posts) = self.cache.get(&key).await {
            tracing::Span::current().record("cached", true);
            return Ok(posts);
        }

        let session = self.connection.session().await?;
        let request_timeout = self.settings.request_timeout;

        let handle = self.resolve(session.as_ref(), channel).await?;

        let budget = limit.saturating_mul(self.settings.over_fetch_factor);
        let mut posts: Vec<PostRecord> = Vec::with_capacity(limit);
        let mut scanned = 0usize;
        {
            let mut messages = session.iter_messages(&handle, budget);
            while posts.len() < limit && scanned < budget {
                let message = match tokio::time::timeout(request_timeout, messages.next()).await {
                    Ok(Some(Ok(message))) => message,
                    Ok(Some(Err(e))) => {
                        return Err(FetchError::MessageFetch {
                            channel: channel.to_string(),
                            reason: e.to_string(),
                        })
                    }
                    Ok(None) => break,
                    Err(_) => {
                        return Err(FetchError::MessageFetch {
                            channel: channel.to_string(),
                            reason: "Request timeout".into(),
                        })
                    }
                };
                scanned += 1;

                if message.views.unwrap_or(0) >= self.settings.min_views {
                    posts.push(PostRecord::from_message(channel, &message));
                }
            }
        }

        tracing::debug!(%channel, scanned, kept = posts.len(), "Scanned channel messages");
        self.cache.put(key, posts.clone()).await;

        let span = tracing::Span::current();
        span.record("scanned", scanned as u64);
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(posts)
    }

    /// Download the photo attached to a message.
    #[instrument(name = "telegram.service.photo", skip(self))]
    pub async fn photo(&self, channel: &str, message_id: i64) -> Result<PhotoBytes, FetchError> {
        let session = self.connection.session().await?;
        let request_timeout = self.settings.request_timeout;

        let handle = self.resolve(session.as_ref(), channel).await?;

        let message =
            match tokio::time::timeout(request_timeout, session.get_message(&handle, message_id))
                .await
            {
                Ok(Ok(message)) => message,
                Ok(Err(e)) => {
                    return Err(FetchError::MessageFetch {
                        channel: channel.to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(FetchError::MessageFetch {
                        channel: channel.to_string(),
                        reason: "Request timeout".into(),
                    })
                }
            };

        let photo = message
            .and_then(|message| message.photo)
            .ok_or_else(|| {
                FetchError::MediaDownload(format!("Message {} has no photo", message_id))
            })?;

        match tokio::time::timeout(request_timeout, session.download_photo(&photo)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(FetchError::MediaDownload(e.to_string())),
            Err(_) => Err(FetchError::MediaDownload("Download timeout".into())),
        }
    }

    async fn resolve(
        &self,
        session: &dyn ChannelSession,
        channel: &str,
    ) -> Result<ChannelHandle, FetchError> {
        match tokio::time::timeout(self.settings.request_timeout, session.resolve_channel(channel))
            .await
        {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(e)) => Err(FetchError::ChannelNotFound {
                channel: channel.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(FetchError::ChannelNotFound {
                channel: channel.to_string(),
                reason: "Resolve timeout".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_settings_from_config() {
        let settings = FetchSettings::from_config(&TelegramSettings::default());
        assert_eq!(settings.min_views, 500);
        assert_eq!(settings.over_fetch_factor, 5);
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert!(settings.demo_fallback);
    }

    #[test]
    fn test_fetch_settings_factor_at_least_one() {
        let config = TelegramSettings {
            over_fetch_factor: 0,
            ..TelegramSettings::default()
        };
        assert_eq!(FetchSettings::from_config(&config).over_fetch_factor, 1);
    }
}
