//! Header mapping and per-row conversion

use std::collections::BTreeMap;

use ::csv::{Position, ReaderBuilder, Trim};
use serde_json::Value;

use super::{CsvRow, RowError, IGNORED_COLUMNS, IMPORT_COLUMNS};
use crate::classify::LevelInference;
use crate::models::{ItemDraft, ItemPayload, JsonMap, Level};
use crate::text::split_tags;

/// Header plus records of a CSV text
#[derive(Debug, Clone, Default)]
pub struct CsvDocument {
    /// Header names, trimmed, in file order
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
    /// Records the reader could not split into fields
    pub malformed: Vec<RowError>,
}

impl CsvDocument {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Header names the importer neither uses nor skips
    pub fn unknown_columns(&self) -> Vec<&str> {
        self.headers
            .iter()
            .map(String::as_str)
            .filter(|h| !h.is_empty())
            .filter(|h| !IMPORT_COLUMNS.contains(h) && !IGNORED_COLUMNS.contains(h))
            .collect()
    }

    /// Warning naming the unknown columns, if any
    pub fn unknown_columns_warning(&self) -> Option<String> {
        let unknown = self.unknown_columns();
        (!unknown.is_empty()).then(|| format!("ignoring unknown column(s): {}", unknown.join(", ")))
    }
}

/// Split `text` into header and records
///
/// Fields are trimmed; short records are padded by absence (missing columns
/// read as blank). Blank lines are skipped.
pub fn parse_document(text: &str) -> crate::Result<CsvDocument> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut document = CsvDocument {
        headers,
        ..Default::default()
    };

    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                let row = record
                    .position()
                    .map(|p| physical_line(text, p))
                    .unwrap_or(idx + 2);
                let fields: BTreeMap<String, String> = document
                    .headers
                    .iter()
                    .zip(record.iter())
                    .filter(|(h, _)| !h.is_empty())
                    .map(|(h, v)| (h.clone(), v.to_string()))
                    .collect();
                document.rows.push(CsvRow { row, fields });
            }
            Err(e) => {
                let row = e
                    .position()
                    .map(|p| physical_line(text, p))
                    .unwrap_or(idx + 2);
                document.malformed.push(RowError {
                    row,
                    error: format!("row {}: malformed CSV record: {}", row, e),
                });
            }
        }
    }

    Ok(document)
}

/// 1-based line on which the record at `position` starts
///
/// The reader positions a record before the line breaks it skips (the `\n`
/// of a `\r\n` pair, blank lines), so those are stepped over first.
fn physical_line(text: &str, position: &Position) -> usize {
    let bytes = text.as_bytes();
    let mut start = (position.byte() as usize).min(bytes.len());
    while start < bytes.len() && matches!(bytes[start], b'\r' | b'\n') {
        start += 1;
    }
    bytes[..start].iter().filter(|b| **b == b'\n').count() + 1
}

/// A row turned into a store payload
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub row: usize,
    pub payload: ItemPayload,
    pub inference: LevelInference,
    pub parent_code: Option<String>,
}

impl ParsedRow {
    /// Classification notice for this row, if the level was a guess
    pub fn inference_warning(&self) -> Option<String> {
        self.inference
            .warning(&self.payload.name)
            .map(|w| format!("row {}: {}", self.row, w))
    }
}

/// Convert one record into an item payload
///
/// Fails with a message naming the row when `name` is missing, a JSON column
/// is not an object, or `level` is not a known level.
pub fn parse_row(row: &CsvRow) -> Result<ParsedRow, String> {
    let name = row
        .get("name")
        .ok_or_else(|| format!("row {}: missing required field 'name'", row.row))?;

    let level = match row.get("level") {
        Some(raw) => Some(
            raw.parse::<Level>()
                .map_err(|_| format!("row {}: unknown level '{}'", row.row, raw))?,
        ),
        None => None,
    };

    let draft = ItemDraft {
        code: row.get("code").map(str::to_string),
        name: name.to_string(),
        level,
        is_kit: row.get("is_kit").map(parse_flag).unwrap_or(false),
        context: json_object(row, "context")?,
        attributes: json_object(row, "attributes")?,
        tags: row.get("tags").map(split_tags).unwrap_or_default().into_iter().collect(),
    };
    let (payload, inference) = draft.resolve();

    Ok(ParsedRow {
        row: row.row,
        payload,
        inference,
        parent_code: row.get("parent_code").map(str::to_string),
    })
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_lowercase().as_str(),
        "true" | "1" | "yes" | "sim"
    )
}

fn json_object(row: &CsvRow, column: &str) -> Result<JsonMap, String> {
    let Some(raw) = row.get(column) else {
        return Ok(JsonMap::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "row {}: {} must be a JSON object, got {}",
            row.row,
            column,
            json_type(&other)
        )),
        Err(e) => Err(format!("row {}: invalid JSON in {}: {}", row.row, column, e)),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> CsvRow {
        CsvRow {
            row: 2,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_headers_in_any_order() {
        let doc = parse_document("tags,name,code\nmotor;naval,Bloco,B-1\n").unwrap();
        assert_eq!(doc.headers, vec!["tags", "name", "code"]);
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(doc.rows[0].row, 2);
        assert_eq!(doc.rows[0].get("name"), Some("Bloco"));
        assert_eq!(doc.rows[0].get("code"), Some("B-1"));
    }

    #[test]
    fn test_row_numbers_follow_physical_lines() {
        let doc = parse_document("name\nA\n\nB\n").unwrap();
        let rows: Vec<usize> = doc.rows.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 4]);
    }

    #[test]
    fn test_row_numbers_with_crlf_line_endings() {
        let doc = parse_document("name\r\nA\r\n\r\nB\r\nC\r\n").unwrap();
        let rows: Vec<usize> = doc.rows.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 4, 5]);
    }

    #[test]
    fn test_row_numbers_count_quoted_line_breaks() {
        let doc = parse_document("name,context\n\"Anel\nlargo\",\nPorca,\n").unwrap();
        let rows: Vec<usize> = doc.rows.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 4]);
    }

    #[test]
    fn test_unknown_columns_reported_but_timestamps_skipped() {
        let doc = parse_document("name,color,created_at,updated_at\nA,red,x,y\n").unwrap();
        assert_eq!(doc.unknown_columns(), vec!["color"]);
        assert!(doc.unknown_columns_warning().unwrap().contains("color"));
    }

    #[test]
    fn test_quoted_json_field() {
        let doc = parse_document("name,context\n\"Anel\",\"{\"\"oem\"\": \"\"cat\"\"}\"\n").unwrap();
        let parsed = parse_row(&doc.rows[0]).unwrap();
        assert_eq!(parsed.payload.context.get("oem"), Some(&Value::String("cat".into())));
    }

    #[test]
    fn test_missing_name_is_row_error() {
        let err = parse_row(&row(&[("code", "X-1"), ("name", "  ")])).unwrap_err();
        assert!(err.contains("row 2"));
        assert!(err.contains("name"));
    }

    #[test]
    fn test_invalid_json_is_row_error() {
        let err = parse_row(&row(&[("name", "Anel"), ("context", "{oops")])).unwrap_err();
        assert!(err.starts_with("row 2: invalid JSON in context"));

        let err = parse_row(&row(&[("name", "Anel"), ("attributes", "[1,2]")])).unwrap_err();
        assert!(err.contains("must be a JSON object"));
    }

    #[test]
    fn test_unknown_level_is_row_error() {
        let err = parse_row(&row(&[("name", "Anel"), ("level", "Gadget")])).unwrap_err();
        assert!(err.contains("unknown level 'Gadget'"));
    }

    #[test]
    fn test_blank_level_is_inferred() {
        let parsed = parse_row(&row(&[("name", "Kit de juntas"), ("level", "")])).unwrap();
        assert_eq!(parsed.payload.level, Level::Kit);
        assert!(parsed.inference_warning().is_none());

        let parsed = parse_row(&row(&[("name", "Coisa estranha")])).unwrap();
        assert_eq!(parsed.payload.level, Level::Peca);
        assert!(parsed.inference_warning().unwrap().starts_with("row 2:"));
    }

    #[test]
    fn test_is_kit_flag_forms() {
        for raw in ["true", "1", "YES", "Sim"] {
            let parsed = parse_row(&row(&[("name", "Caixa"), ("is_kit", raw)])).unwrap();
            assert_eq!(parsed.payload.level, Level::Kit, "flag {}", raw);
        }
        let parsed = parse_row(&row(&[("name", "Caixa"), ("is_kit", "false")])).unwrap();
        assert_ne!(parsed.payload.level, Level::Kit);
    }

    #[test]
    fn test_tags_split_and_parent_code() {
        let parsed = parse_row(&row(&[
            ("name", "Pistão"),
            ("code", "P-1"),
            ("tags", " motor ; ;naval"),
            ("parent_code", "B-1"),
        ]))
        .unwrap();
        let tags: Vec<&str> = parsed.payload.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["motor", "naval"]);
        assert_eq!(parsed.parent_code.as_deref(), Some("B-1"));
        assert_eq!(parsed.payload.context.get("naval"), Some(&Value::Bool(true)));
    }
}
