//! Category feed handler.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::feed::CategoryFeed;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// `GET /telegram/channels/{category}?limit=N`
pub async fn category_feed(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<CategoryFeed>, AppError> {
    let feed = state.feed.category_feed(&category, params.limit).await?;
    Ok(Json(feed))
}
