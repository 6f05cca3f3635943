use axum::{
    http::{header::CACHE_CONTROL, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::CACHE_CONTROL_ERROR;
use crate::telegram::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Placeholder image unavailable: {0}")]
    PlaceholderUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnknownCategory(_) => StatusCode::NOT_FOUND,
            AppError::Fetch(FetchError::ChannelNotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Fetch(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PlaceholderUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(_) => {
                tracing::error!("Internal error: {:?}", self);
                "Internal server error".to_string()
            }
            AppError::Fetch(e) => {
                tracing::warn!(category = e.category(), error = %e, "Fetch error");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_ERROR));
        response
    }
}
