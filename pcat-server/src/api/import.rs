//! CSV import, validation and export endpoints
//!
//! Import and validate take the raw CSV text as the request body.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use pcat_common::csv::{CsvValidation, ImportResult};
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

/// POST /api/import
///
/// Always 200: per-row failures are reported inside the receipt.
pub async fn import_csv(State(state): State<AppState>, body: String) -> Json<ImportResult> {
    let result = state.catalog.import_csv(&body).await;
    info!(
        success = result.success,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "Import request finished"
    );
    Json(result)
}

/// POST /api/import/validate
pub async fn validate_csv(State(state): State<AppState>, body: String) -> Json<CsvValidation> {
    Json(state.catalog.validate_csv(&body))
}

/// GET /api/export
pub async fn export_csv(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let csv = state.catalog.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"catalog.csv\""),
        ],
        csv,
    ))
}
