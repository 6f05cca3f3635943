//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, WEB_PREVIEW_USER_AGENT};
use crate::error::AppError;
use crate::feed::FeedService;
use crate::telegram::TelegramService;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the application configuration, the Telegram post service, the
/// category feed aggregator built on top of it, and an HTTP client used by the
/// photo proxy to fetch placeholder images.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub telegram: TelegramService,
    pub feed: FeedService,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, telegram: TelegramService) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let http = http_client(
            Duration::from_secs(config.telegram.request_timeout_seconds),
            WEB_PREVIEW_USER_AGENT,
        )?;

        Ok(Self {
            feed: FeedService::new(config.clone(), telegram.clone()),
            config,
            telegram,
            http,
        })
    }
}

fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}
