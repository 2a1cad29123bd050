//! Tag vocabulary endpoint

use axum::{extract::State, Json};
use pcat_common::CatalogTag;

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/tags
///
/// Every known tag with its classification kind, ordered by name.
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<CatalogTag>>> {
    Ok(Json(state.catalog.tags().await?))
}
