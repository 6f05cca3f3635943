//! Photo proxy.
//!
//! Serves the photo attached to a channel message. When the photo cannot be
//! loaded for any reason a placeholder image is fetched and served instead.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::config::DEFAULT_PHOTO_CONTENT_TYPE;
use crate::error::AppError;
use crate::state::AppState;
use crate::telegram::placeholder_photo_url;

/// `GET /photo/{channel}/{message_id}`
pub async fn photo(
    State(state): State<AppState>,
    Path((channel, message_id)): Path<(String, i64)>,
) -> Result<Response, AppError> {
    match state.telegram.photo(&channel, message_id).await {
        Ok(photo) => Ok(image_response(&photo.content_type, photo.bytes)),
        Err(e) => {
            tracing::warn!(
                %channel,
                message_id,
                category = e.category(),
                error = %e,
                "Photo unavailable, serving placeholder"
            );
            placeholder(&state, &channel, message_id).await
        }
    }
}

async fn placeholder(
    state: &AppState,
    channel: &str,
    message_id: i64,
) -> Result<Response, AppError> {
    let url = placeholder_photo_url(
        &state.config.telegram.placeholder_image_url,
        channel,
        message_id,
    );

    let response = state
        .http
        .get(&url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| AppError::PlaceholderUnavailable(e.to_string()))?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_PHOTO_CONTENT_TYPE)
        .to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::PlaceholderUnavailable(e.to_string()))?;

    Ok(image_response(&content_type, bytes.to_vec()))
}

fn image_response(content_type: &str, bytes: Vec<u8>) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_PHOTO_CONTENT_TYPE));
    ([(CONTENT_TYPE, content_type)], Body::from(bytes)).into_response()
}
