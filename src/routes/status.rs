//! Service status endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::image_provider_key_present;
use crate::state::AppState;
use crate::telegram::ConnectionStatus;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: &'static str,
    pub status: &'static str,
    /// `live` when credentials are configured, `demo` otherwise
    pub mode: &'static str,
    pub connection: ConnectionStatus,
    pub demo_fallback: bool,
    pub categories: Vec<String>,
    pub image_provider_configured: bool,
}

pub async fn index(State(state): State<AppState>) -> Json<StatusResponse> {
    let mode = if state.telegram.has_credentials() {
        "live"
    } else {
        "demo"
    };

    Json(StatusResponse {
        message: "Telegram channel feed",
        status: "running",
        mode,
        connection: state.telegram.status().await,
        demo_fallback: state.telegram.demo_fallback(),
        categories: state.config.feed.categories.keys().cloned().collect(),
        image_provider_configured: image_provider_key_present(),
    })
}
