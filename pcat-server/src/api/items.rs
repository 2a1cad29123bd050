//! Item endpoints: search, create/update, detail, delete and hierarchy edits

use axum::{
    extract::{Path, Query, State},
    Json,
};
use pcat_common::models::{CatalogResponse, ItemRelations};
use pcat_common::store::SearchFilter;
use pcat_common::{CatalogItem, ItemDraft, Level};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::AppState;

/// Query parameters of GET /api/items
#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    /// Free text over name and code
    pub q: Option<String>,
    pub tag: Option<String>,
    pub level: Option<String>,
    pub has_parent: Option<bool>,
    pub has_children: Option<bool>,
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// One page of items with paging metadata
#[derive(Debug, Serialize)]
pub struct ItemPage {
    pub items: Vec<CatalogItem>,
    pub total_results: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// Item with its direct neighbours
#[derive(Debug, Serialize)]
pub struct ItemDetail {
    pub item: CatalogItem,
    #[serde(flatten)]
    pub relations: ItemRelations,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Deserialize)]
pub struct RetagRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachRequest {
    pub child_code: String,
    pub relation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub from_parent_code: String,
    pub to_parent_code: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    /// `null` clears the price
    pub price: Option<f64>,
}

/// Parse an optional level parameter, blank meaning "any"
pub(crate) fn parse_level(raw: Option<&str>) -> ApiResult<Option<Level>> {
    match raw.map(str::trim).filter(|l| !l.is_empty()) {
        Some(raw) => raw
            .parse::<Level>()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("unknown level '{}'", raw))),
        None => Ok(None),
    }
}

/// GET /api/items
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<ItemPage>> {
    let mut filter = SearchFilter::new(
        query.q.as_deref(),
        query.tag.as_deref(),
        parse_level(query.level.as_deref())?,
    );
    filter.has_parent = query.has_parent;
    filter.has_children = query.has_children;

    let total_results = state.catalog.count(&filter).await?;
    let pagination = calculate_pagination(total_results, query.page);
    let items = state
        .catalog
        .search_filtered(&filter.with_page(PAGE_SIZE, pagination.offset))
        .await?;

    Ok(Json(ItemPage {
        items,
        total_results,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
    }))
}

/// POST /api/items
pub async fn create_item(
    State(state): State<AppState>,
    Json(draft): Json<ItemDraft>,
) -> ApiResult<Json<CatalogResponse<CatalogItem>>> {
    let outcome = state.catalog.create_item(draft).await?;
    Ok(Json(outcome.into()))
}

/// GET /api/items/:code
pub async fn get_item(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<ItemDetail>> {
    let item = state.catalog.get_item(&code).await?;
    let relations = state.catalog.item_relations(&code).await?;
    Ok(Json(ItemDetail { item, relations }))
}

/// DELETE /api/items/:code?cascade=true
pub async fn delete_item(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<CatalogResponse<u64>>> {
    let outcome = state.catalog.delete_item(&code, query.cascade).await?;
    Ok(Json(outcome.into()))
}

/// PUT /api/items/:code/tags
pub async fn retag_item(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<RetagRequest>,
) -> ApiResult<Json<CatalogResponse<CatalogItem>>> {
    let outcome = state.catalog.retag_item(&code, &request.tags).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/items/:code/children
pub async fn attach_child(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<AttachRequest>,
) -> ApiResult<Json<CatalogResponse<()>>> {
    let outcome = state
        .catalog
        .attach_child(&code, &request.child_code, request.relation.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /api/items/:code/move
pub async fn move_item(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<MoveRequest>,
) -> ApiResult<Json<CatalogResponse<()>>> {
    let outcome = state
        .catalog
        .move_item(&code, &request.from_parent_code, &request.to_parent_code)
        .await?;
    Ok(Json(outcome.into()))
}

/// PUT /api/items/:code/price
pub async fn set_price(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<PriceRequest>,
) -> ApiResult<Json<CatalogResponse<()>>> {
    let outcome = state.catalog.set_price(&code, request.price).await?;
    Ok(Json(outcome.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None).unwrap(), None);
        assert_eq!(parse_level(Some(" ")).unwrap(), None);
        assert_eq!(parse_level(Some("peca")).unwrap(), Some(Level::Peca));
        assert!(matches!(
            parse_level(Some("Gadget")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
