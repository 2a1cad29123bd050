//! Row-by-row import into a catalog store

use std::time::Duration;

use tracing::{debug, info, warn};

use super::parse::{parse_document, parse_row, ParsedRow};
use super::{ImportResult, RowError};
use crate::containment::can_contain;
use crate::models::DEFAULT_RELATION;
use crate::store::{bounded, CatalogStore};

/// Import every data row of `text` into `store`
///
/// Rows are processed sequentially in file order. A failing row is recorded
/// and skipped; a failing parent link only adds a warning. Never fails as a
/// whole: unreadable input is reported inside the result.
pub async fn import_csv(store: &dyn CatalogStore, text: &str, request_timeout: Duration) -> ImportResult {
    let mut result = ImportResult::default();

    if text.trim().is_empty() {
        result.warnings.push("empty input".to_string());
        return result;
    }

    let document = match parse_document(text) {
        Ok(document) => document,
        Err(e) => {
            result.errors.push(RowError {
                row: 1,
                error: format!("row 1: unreadable header: {}", e),
            });
            return result;
        }
    };

    if let Some(warning) = document.unknown_columns_warning() {
        result.warnings.push(warning);
    }
    if !document.has_column("name") {
        result
            .warnings
            .push("header has no 'name' column; every row will be rejected".to_string());
    }
    result.errors.extend(document.malformed.iter().cloned());

    info!(rows = document.rows.len(), "Importing catalog CSV");

    for row in &document.rows {
        let parsed = match parse_row(row) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(row = row.row, %error, "Rejected CSV row");
                result.errors.push(RowError { row: row.row, error });
                continue;
            }
        };

        if let Some(warning) = parsed.inference_warning() {
            result.warnings.push(warning);
        }

        match bounded(request_timeout, store.create_or_update_item(&parsed.payload)).await {
            Ok(outcome) => {
                result.success += 1;
                result.warnings.extend(
                    outcome
                        .warnings
                        .into_iter()
                        .map(|w| format!("row {}: {}", parsed.row, w)),
                );
            }
            Err(e) => {
                result.errors.push(RowError {
                    row: parsed.row,
                    error: format!("row {}: {}", parsed.row, e),
                });
                continue;
            }
        }

        result
            .warnings
            .extend(link_parent(store, &parsed, request_timeout).await);
    }

    if result.has_errors() {
        warn!(
            success = result.success,
            errors = result.errors.len(),
            "CSV import finished with errors"
        );
    } else {
        info!(success = result.success, "CSV import finished");
    }

    result
}

/// Attach the row's item under its `parent_code`, returning warnings
async fn link_parent(store: &dyn CatalogStore, parsed: &ParsedRow, limit: Duration) -> Vec<String> {
    let Some(parent_code) = parsed.parent_code.as_deref() else {
        return Vec::new();
    };
    let row = parsed.row;

    let Some(code) = parsed.payload.code.as_deref() else {
        return vec![format!(
            "row {}: parent_code '{}' ignored because the row has no code",
            row, parent_code
        )];
    };

    match bounded(limit, store.get_item(parent_code)).await {
        Ok(Some(parent)) if !can_contain(parent.level, parsed.payload.level) => {
            return vec![format!(
                "row {}: could not attach '{}' to '{}': {} cannot contain {}",
                row, code, parent_code, parent.level, parsed.payload.level
            )];
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            return vec![format!(
                "row {}: could not attach '{}' to '{}': parent not found",
                row, code, parent_code
            )];
        }
        Err(e) => {
            return vec![format!(
                "row {}: could not attach '{}' to '{}': {}",
                row, code, parent_code, e
            )];
        }
    }

    match bounded(limit, store.attach_child(parent_code, code, DEFAULT_RELATION)).await {
        Ok(outcome) => outcome
            .warnings
            .iter()
            .map(|w| format!("row {}: {}", row, w))
            .collect(),
        Err(e) => vec![format!(
            "row {}: could not attach '{}' to '{}': {}",
            row, code, parent_code, e
        )],
    }
}
