//! Common error types for PCAT

use std::time::Duration;

use thiserror::Error;

use crate::models::Level;

/// Common result type for PCAT operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the catalog crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Parent level may not hold the child level
    #[error("{parent} cannot contain {child}")]
    Containment { parent: Level, child: Level },

    /// Relation would make an item its own ancestor
    #[error("Cycle detected: {0}")]
    Cycle(String),

    /// The store refused the operation (constraint, business rule)
    #[error("Rejected by store: {0}")]
    Rejected(String),

    /// Transport failure talking to a remote store
    #[error("Remote store error: {0}")]
    Remote(String),

    /// A single store request exceeded its deadline
    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),

    /// CSV reader/writer error
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation not offered by this store backend
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Remote(format!("request timed out: {}", err))
        } else {
            Error::Remote(err.to_string())
        }
    }
}
