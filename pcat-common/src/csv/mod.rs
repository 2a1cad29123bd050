//! CSV import, validation and export
//!
//! Import is an itemized, non-transactional batch: every row is attempted,
//! failures are reported per row and never roll back earlier rows.
//! Validation is the same parse without any store access.

mod export;
mod import;
mod parse;
mod validate;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use export::{export_csv, write_csv};
pub use import::import_csv;
pub use parse::{parse_document, parse_row, CsvDocument, ParsedRow};
pub use validate::validate_csv;

/// Columns understood by the importer
pub const IMPORT_COLUMNS: &[&str] = &[
    "code",
    "name",
    "level",
    "tags",
    "parent_code",
    "is_kit",
    "context",
    "attributes",
];

/// Exported columns, in order
pub const EXPORT_COLUMNS: &[&str] = &[
    "code",
    "name",
    "level",
    "tags",
    "context",
    "attributes",
    "created_at",
    "updated_at",
];

/// Columns produced by export that import skips without a warning
pub const IGNORED_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// Rows shown by [`validate_csv`]
pub const PREVIEW_ROWS: usize = 5;

/// One data record keyed by header name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    /// Physical line number (the header is line 1)
    pub row: usize,
    pub fields: BTreeMap<String, String>,
}

impl CsvRow {
    /// Trimmed value of `column`, `None` when absent or blank
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// A row that could not be turned into an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

/// Receipt of an import run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Rows whose item was created or updated
    pub success: usize,
    pub errors: Vec<RowError>,
    /// Relation failures and classification notices
    pub warnings: Vec<String>,
}

impl ImportResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Dry-run report of [`validate_csv`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub preview: Vec<CsvRow>,
}
