//! Level inference endpoint (dry run, nothing stored)

use axum::{extract::State, Json};
use pcat_common::classify::LevelInference;
use serde::{Deserialize, Serialize};

use super::items::parse_level;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub level: Option<String>,
    #[serde(default)]
    pub is_kit: bool,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    #[serde(flatten)]
    pub inference: LevelInference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// POST /api/classify
pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<ClassifyRequest>,
) -> ApiResult<Json<ClassifyResponse>> {
    let explicit = parse_level(request.level.as_deref())?;
    let inference = state
        .catalog
        .classify(&request.name, &request.tags, explicit, request.is_kit);

    Ok(Json(ClassifyResponse {
        warning: inference.warning(&request.name),
        inference,
    }))
}
