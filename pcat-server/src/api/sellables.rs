//! Priced items

use axum::{extract::State, Json};
use pcat_common::models::SellableItem;

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/sellables
pub async fn list_sellables(State(state): State<AppState>) -> ApiResult<Json<Vec<SellableItem>>> {
    Ok(Json(state.catalog.sellables().await?))
}
