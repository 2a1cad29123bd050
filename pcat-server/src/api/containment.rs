//! Containment matrix endpoint

use axum::Json;
use pcat_common::containment::{matrix, ContainmentRule};

/// GET /api/containment
///
/// Allowed child levels for every level; static, needs no store.
pub async fn get_containment() -> Json<Vec<ContainmentRule>> {
    Json(matrix())
}
