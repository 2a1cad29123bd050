//! Audit trail endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use pcat_common::models::AuditLog;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Restrict to entries about one item
    pub item_code: Option<String>,
    /// Maximum entries (default 100)
    pub limit: Option<i64>,
}

/// GET /api/audit?item_code=X&limit=N
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    let logs = state
        .catalog
        .audit_logs(query.item_code.as_deref(), query.limit)
        .await?;
    Ok(Json(logs))
}
