//! Error types for Telegram operations.
//!
//! Backend implementations report [`BackendError`], a plain message that can be
//! cloned across broadcast channels. The fetcher classifies backend failures
//! into the [`FetchError`] taxonomy, whose `category()` is what gets logged.

use std::fmt;

/// Error reported by a backend implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

/// Why real channel data could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Telegram credentials not configured (missing: {0})")]
    MissingCredentials(String),

    #[error("Telegram connection failed: {0}")]
    ConnectionFailure(String),

    #[error("Channel {channel} not found: {reason}")]
    ChannelNotFound { channel: String, reason: String },

    #[error("Failed to fetch messages from {channel}: {reason}")]
    MessageFetch { channel: String, reason: String },

    #[error("Failed to download media: {0}")]
    MediaDownload(String),
}

impl FetchError {
    /// Stable category name used in logs.
    pub fn category(&self) -> &'static str {
        match self {
            FetchError::MissingCredentials(_) => "missing_credentials",
            FetchError::ConnectionFailure(_) => "connection_failure",
            FetchError::ChannelNotFound { .. } => "channel_not_found",
            FetchError::MessageFetch { .. } => "message_fetch_error",
            FetchError::MediaDownload(_) => "media_download_error",
        }
    }
}
