//! HTTP route handlers for the feed API.
//!
//! Routes are organized by content type, with per-route Cache-Control headers.
//! Photos never change once posted and use a long cache duration, while
//! category feeds use a short one so newly popular posts show up.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod channels;
pub mod health;
pub mod photo;
pub mod status;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::{CACHE_CONTROL_FEED, CACHE_CONTROL_PHOTO};
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router with all routes and cache headers.
pub fn create_router(state: AppState) -> Router {
    // Category feeds - short cache, the service refreshes every few minutes
    let feed_routes = Router::new()
        .route("/telegram/channels/{category}", get(channels::category_feed))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_FEED),
        ));

    // Photos - long cache, message media is immutable
    let photo_routes = Router::new()
        .route("/photo/{channel}/{message_id}", get(photo::photo))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_PHOTO),
        ));

    // Status and health - no caching, always fresh for probes
    let status_routes = Router::new()
        .route("/", get(status::index))
        .route("/health", get(health::health));

    Router::new()
        .merge(feed_routes)
        .merge(photo_routes)
        .merge(status_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
