//! Error types for pcat-server
//!
//! Every handler failure renders as `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pcat_common::Error as CatalogError;
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Catalog library error, mapped by kind
    #[error("{0}")]
    Catalog(#[from] CatalogError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Catalog(err) => match err {
                CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CatalogError::InvalidInput(_) | CatalogError::Csv(_) | CatalogError::Json(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                }
                CatalogError::Containment { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "CONTAINMENT_VIOLATION")
                }
                CatalogError::Cycle(_) => (StatusCode::UNPROCESSABLE_ENTITY, "CYCLE"),
                CatalogError::Rejected(_) => (StatusCode::CONFLICT, "REJECTED"),
                CatalogError::Unsupported(_) => (StatusCode::NOT_IMPLEMENTED, "UNSUPPORTED"),
                CatalogError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "STORE_TIMEOUT"),
                CatalogError::Remote(_) => (StatusCode::BAD_GATEWAY, "STORE_UNAVAILABLE"),
                CatalogError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "CONFIG_ERROR"),
                CatalogError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                CatalogError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                CatalogError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Catalog(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pcat_common::Level;

    #[test]
    fn test_catalog_errors_map_to_status() {
        let cases = [
            (CatalogError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CatalogError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                CatalogError::Containment {
                    parent: Level::Peca,
                    child: Level::Kit,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (CatalogError::Rejected("x".into()), StatusCode::CONFLICT),
            (CatalogError::Unsupported("x".into()), StatusCode::NOT_IMPLEMENTED),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
