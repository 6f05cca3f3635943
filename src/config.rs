//! Configuration loading and constants.
//!
//! Loads application configuration from TOML files and defines constants for
//! HTTP cache TTLs, post normalization, demo data, Telegram timeouts and
//! logging defaults. `AppConfig` is the root configuration struct. Telegram
//! credentials never live in the file; they are read from the environment
//! into [`Credentials`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use const_format::formatcp;
use serde::Deserialize;

// =============================================================================
// HTTP Response Cache Control
// =============================================================================
// Cache-Control values for upstream caches. All values are in seconds.

/// Category feeds - the service already caches per channel for five minutes
pub const HTTP_CACHE_FEED_MAX_AGE: u32 = 30;

/// Proxied photos - message media never changes
pub const HTTP_CACHE_PHOTO_MAX_AGE: u32 = 3600;

/// Error responses - short TTL so a recovering backend is picked up quickly
pub const HTTP_CACHE_ERROR_MAX_AGE: u32 = 5;

pub const CACHE_CONTROL_FEED: &str = formatcp!("public, max-age={}", HTTP_CACHE_FEED_MAX_AGE);

pub const CACHE_CONTROL_PHOTO: &str = formatcp!("public, max-age={}", HTTP_CACHE_PHOTO_MAX_AGE);

pub const CACHE_CONTROL_ERROR: &str = formatcp!("public, max-age={}", HTTP_CACHE_ERROR_MAX_AGE);

// =============================================================================
// Post Normalization
// =============================================================================

/// Maximum characters kept from a message text
pub const POST_TEXT_LIMIT: usize = 200;

/// Text used for messages without any text (photo-only posts)
pub const EMPTY_TEXT_PLACEHOLDER: &str = "No text";

/// Base URL for canonical post links
pub const TELEGRAM_POST_URL_BASE: &str = "https://t.me";

/// Image shown for posts that carry no photo
pub const PLACEHOLDER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1441986300917-64674bd600d8?w=400&h=600&fit=crop";

/// Content type assumed for photo bytes when the backend does not report one
pub const DEFAULT_PHOTO_CONTENT_TYPE: &str = "image/jpeg";

// =============================================================================
// Demo Data
// =============================================================================

/// Maximum number of synthetic posts per channel
pub const DEMO_POST_COUNT: usize = 3;

/// Baseline and per-position decrement for synthetic engagement numbers
pub const DEMO_VIEWS_BASE: u64 = 15000;
pub const DEMO_VIEWS_STEP: u64 = 1000;
pub const DEMO_LIKES_BASE: u64 = 750;
pub const DEMO_LIKES_STEP: u64 = 50;
pub const DEMO_COMMENTS_BASE: u64 = 150;
pub const DEMO_COMMENTS_STEP: u64 = 10;

/// Placeholder images cycled through by synthetic posts
pub const DEMO_IMAGE_URLS: [&str; 3] = [
    "https://images.unsplash.com/photo-1441986300917-64674bd600d8?w=400&h=600&fit=crop",
    "https://images.unsplash.com/photo-1469334031218-e382a71b716b?w=400&h=600&fit=crop",
    "https://images.unsplash.com/photo-1445205170230-053b83016050?w=400&h=600&fit=crop",
];

// =============================================================================
// Telegram Backend Constants
// =============================================================================

/// Capacity of the broadcast channel shared by callers awaiting a connection
pub const BROADCAST_CHANNEL_CAPACITY: usize = 16;

/// Moka time-to-live is this multiple of the freshness window (eviction backstop only)
pub const CACHE_TTL_BACKSTOP_MULTIPLIER: u64 = 2;

/// User agent for requests to the channel web preview
pub const WEB_PREVIEW_USER_AGENT: &str =
    formatcp!("telefeed/{} (+https://t.me)", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_API_ID: &str = "TELEGRAM_API_ID";
pub const ENV_API_HASH: &str = "TELEGRAM_API_HASH";
pub const ENV_SESSION: &str = "TELEGRAM_SESSION";
/// Image-generation provider key; only its presence is reported
pub const ENV_IMAGE_PROVIDER_KEY: &str = "FAL_KEY";

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "telefeed=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    pub http: HttpServerConfig,
    /// Telegram backend settings
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Category to channel mapping and feed limits
    #[serde(default)]
    pub feed: FeedConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Settings for connecting to Telegram and scanning channels
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    /// Connection timeout in seconds
    #[serde(default = "TelegramSettings::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Timeout for each backend call in seconds
    #[serde(default = "TelegramSettings::default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Minimum view count for a message to be included
    #[serde(default = "TelegramSettings::default_min_views")]
    pub min_views: u64,
    /// Messages scanned per requested post (compensates for the view filter)
    #[serde(default = "TelegramSettings::default_over_fetch_factor")]
    pub over_fetch_factor: usize,
    /// Substitute synthetic posts when real data is unavailable
    #[serde(default = "TelegramSettings::default_demo_fallback")]
    pub demo_fallback: bool,
    /// Base URL of the channel web preview
    #[serde(default = "TelegramSettings::default_web_base_url")]
    pub web_base_url: String,
    /// Image served by the photo proxy when a message photo is unavailable
    #[serde(default = "TelegramSettings::default_placeholder_image_url")]
    pub placeholder_image_url: String,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: Self::default_connect_timeout(),
            request_timeout_seconds: Self::default_request_timeout(),
            min_views: Self::default_min_views(),
            over_fetch_factor: Self::default_over_fetch_factor(),
            demo_fallback: Self::default_demo_fallback(),
            web_base_url: Self::default_web_base_url(),
            placeholder_image_url: Self::default_placeholder_image_url(),
        }
    }
}

impl TelegramSettings {
    fn default_connect_timeout() -> u64 {
        30
    }

    fn default_request_timeout() -> u64 {
        30
    }

    fn default_min_views() -> u64 {
        500
    }

    fn default_over_fetch_factor() -> usize {
        5
    }

    fn default_demo_fallback() -> bool {
        true
    }

    fn default_web_base_url() -> String {
        TELEGRAM_POST_URL_BASE.to_string()
    }

    fn default_placeholder_image_url() -> String {
        PLACEHOLDER_IMAGE_URL.to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Freshness window for cached channel posts in seconds (default: 5 minutes)
    #[serde(default = "CacheConfig::default_posts_ttl")]
    pub posts_ttl_seconds: u64,
    /// Maximum number of cached (channel, limit) entries (default: 1000)
    #[serde(default = "CacheConfig::default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            posts_ttl_seconds: Self::default_posts_ttl(),
            max_entries: Self::default_max_entries(),
        }
    }
}

impl CacheConfig {
    fn default_posts_ttl() -> u64 {
        300 // 5 minutes
    }
    fn default_max_entries() -> u64 {
        1000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Number of posts returned when the request has no limit
    #[serde(default = "FeedConfig::default_limit")]
    pub default_limit: usize,
    /// Upper bound for the requested limit
    #[serde(default = "FeedConfig::default_max_limit")]
    pub max_limit: usize,
    /// Category name -> channel usernames
    #[serde(default = "FeedConfig::default_categories")]
    pub categories: BTreeMap<String, Vec<String>>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            max_limit: Self::default_max_limit(),
            categories: Self::default_categories(),
        }
    }
}

impl FeedConfig {
    fn default_limit() -> usize {
        25
    }

    fn default_max_limit() -> usize {
        100
    }

    fn default_categories() -> BTreeMap<String, Vec<String>> {
        let mut categories = BTreeMap::new();
        categories.insert(
            "fashion".to_string(),
            vec![
                "rogov24".to_string(),
                "burimovasasha".to_string(),
                "zarina_brand".to_string(),
            ],
        );
        categories
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.posts_ttl_seconds == 0 {
            return Err(ConfigError::Validation(
                "cache.posts_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        if self.telegram.over_fetch_factor == 0 {
            return Err(ConfigError::Validation(
                "telegram.over_fetch_factor must be at least 1".to_string(),
            ));
        }
        if self.feed.max_limit == 0 {
            return Err(ConfigError::Validation(
                "feed.max_limit must be at least 1".to_string(),
            ));
        }
        if self.feed.categories.is_empty() {
            return Err(ConfigError::Validation(
                "No feed categories configured. Add a [feed.categories] table".to_string(),
            ));
        }
        if let Some((name, _)) = self
            .feed
            .categories
            .iter()
            .find(|(_, channels)| channels.is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "Category '{}' has no channels",
                name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Telegram credential bundle read from the process environment.
///
/// Any missing field forces demo mode. The application id is kept as the raw
/// string so a malformed value surfaces as a connection failure rather than
/// silently looking absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub session: Option<String>,
}

impl Credentials {
    /// Read the bundle from `TELEGRAM_API_ID`, `TELEGRAM_API_HASH` and `TELEGRAM_SESSION`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the bundle from an arbitrary variable lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Self {
            api_id: read(ENV_API_ID),
            api_hash: read(ENV_API_HASH),
            session: read(ENV_SESSION),
        }
    }

    /// Names of the environment variables that are not set
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_id.is_none() {
            missing.push(ENV_API_ID);
        }
        if self.api_hash.is_none() {
            missing.push(ENV_API_HASH);
        }
        if self.session.is_none() {
            missing.push(ENV_SESSION);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Numeric application id, if present and well-formed
    pub fn api_id_number(&self) -> Option<i32> {
        self.api_id.as_deref().and_then(|id| id.parse().ok())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &self.api_hash.as_ref().map(|_| "<redacted>"))
            .field("session", &self.session.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Whether the image-generation provider key is present in the environment
pub fn image_provider_key_present() -> bool {
    std::env::var(ENV_IMAGE_PROVIDER_KEY)
        .map(|key| !key.trim().is_empty())
        .unwrap_or(false)
}
