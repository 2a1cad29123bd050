//! pcat-server library - HTTP front end of the product catalog
//!
//! Exposes the catalog facade (search, item edits, hierarchy, tags, audit,
//! CSV transfer) as a JSON API.

use axum::Router;
use pcat_common::Catalog;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
}

impl AppState {
    /// Create new application state
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post, put};

    let items = Router::new()
        .route("/api/items", get(api::list_items).post(api::create_item))
        .route("/api/items/:code", get(api::get_item).delete(api::delete_item))
        .route("/api/items/:code/tags", put(api::retag_item))
        .route("/api/items/:code/children", post(api::attach_child))
        .route("/api/items/:code/move", post(api::move_item))
        .route("/api/items/:code/price", put(api::set_price));

    let catalog = Router::new()
        .route("/api/tags", get(api::list_tags))
        .route("/api/audit", get(api::list_audit_logs))
        .route("/api/sellables", get(api::list_sellables))
        .route("/api/containment", get(api::get_containment))
        .route("/api/classify", post(api::classify));

    let transfer = Router::new()
        .route("/api/import", post(api::import_csv))
        .route("/api/import/validate", post(api::validate_csv))
        .route("/api/export", get(api::export_csv));

    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(items)
        .merge(catalog)
        .merge(transfer)
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
