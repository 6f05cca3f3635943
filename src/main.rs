//! telefeed: a cached HTTP feed of popular Telegram channel posts.
//!
//! This is the application entry point. It loads configuration from TOML,
//! initializes tracing, reads Telegram credentials from the environment,
//! builds the post service and router, and starts the HTTP server.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telefeed::config::{
    image_provider_key_present, AppConfig, Credentials, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER,
};
use telefeed::http::start_server;
use telefeed::routes::create_router;
use telefeed::state::AppState;
use telefeed::telegram::{SystemClock, TelegramService, WebPreviewConnector};

/// telefeed: popular posts from Telegram channels over HTTP
#[derive(Parser, Debug)]
#[command(name = "telefeed", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "telefeed=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(path = %args.config, "Loaded configuration");

    for (category, channels) in &config.feed.categories {
        tracing::info!(%category, channels = ?channels, "Category configured");
    }

    let credentials = Credentials::from_env();
    tracing::info!(
        api_id = credentials.api_id.is_some(),
        api_hash = credentials.api_hash.is_some(),
        session = credentials.session.is_some(),
        image_provider = image_provider_key_present(),
        "Credential presence"
    );
    if !credentials.is_complete() {
        tracing::warn!(
            missing = ?credentials.missing_fields(),
            demo_fallback = config.telegram.demo_fallback,
            "Telegram credentials incomplete, serving demo data"
        );
    }

    let connector = Arc::new(WebPreviewConnector::new(&config.telegram));
    let telegram = TelegramService::new(&config, credentials, connector, Arc::new(SystemClock));

    let state = AppState::new(config.clone(), telegram)?;
    let app = create_router(state);

    start_server(app, &config).await?;

    Ok(())
}
