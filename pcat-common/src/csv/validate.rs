//! Dry-run validation, no store access

use super::parse::{parse_document, parse_row};
use super::{CsvValidation, PREVIEW_ROWS};

/// Check `text` the way [`import_csv`](super::import_csv) would, without
/// writing anything
pub fn validate_csv(text: &str) -> CsvValidation {
    let mut report = CsvValidation::default();

    if text.trim().is_empty() {
        report.errors.push("empty input".to_string());
        return report;
    }

    let document = match parse_document(text) {
        Ok(document) => document,
        Err(e) => {
            report.errors.push(format!("unreadable header: {}", e));
            return report;
        }
    };

    if !document.has_column("name") {
        report
            .errors
            .push("header must contain a 'name' column".to_string());
    }
    if let Some(warning) = document.unknown_columns_warning() {
        report.warnings.push(warning);
    }
    if document.rows.is_empty() && document.malformed.is_empty() {
        report
            .warnings
            .push("header only, no data rows".to_string());
    }

    report
        .errors
        .extend(document.malformed.iter().map(|m| m.error.clone()));

    if document.has_column("name") {
        for row in &document.rows {
            match parse_row(row) {
                Ok(parsed) => {
                    if let Some(warning) = parsed.inference_warning() {
                        report.warnings.push(warning);
                    }
                    if parsed.parent_code.is_some() && parsed.payload.code.is_none() {
                        report.warnings.push(format!(
                            "row {}: parent_code ignored because the row has no code",
                            row.row
                        ));
                    }
                }
                Err(error) => report.errors.push(error),
            }
        }
    }

    report.preview = document.rows.iter().take(PREVIEW_ROWS).cloned().collect();
    report.valid = report.errors.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_invalid() {
        let report = validate_csv("");
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["empty input"]);

        assert!(!validate_csv("  \n ").valid);
    }

    #[test]
    fn test_header_only_is_valid_with_warning() {
        let report = validate_csv("code,name,level\n");
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("no data rows")));
        assert!(report.preview.is_empty());
    }

    #[test]
    fn test_header_without_name_is_invalid() {
        let report = validate_csv("code,level\nA,Peça\n");
        assert!(!report.valid);
        assert!(report.errors[0].contains("'name'"));
    }

    #[test]
    fn test_row_problems_reported_with_row_numbers() {
        let text = "code,name,context\nA,Anel,{}\nB,,{}\nC,Porca,{bad\n";
        let report = validate_csv(text);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("row 3:"));
        assert!(report.errors[1].starts_with("row 4:"));
    }

    #[test]
    fn test_preview_is_first_five_rows() {
        let mut text = String::from("name\n");
        for i in 0..8 {
            text.push_str(&format!("Parafuso {}\n", i));
        }
        let report = validate_csv(&text);
        assert!(report.valid);
        assert_eq!(report.preview.len(), 5);
        assert_eq!(report.preview[0].get("name"), Some("Parafuso 0"));
    }
}
