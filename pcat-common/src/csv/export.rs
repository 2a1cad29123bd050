//! Catalog export

use std::time::Duration;

use ::csv::{QuoteStyle, Terminator, WriterBuilder};
use chrono::SecondsFormat;
use serde_json::Value;
use tracing::info;

use super::EXPORT_COLUMNS;
use crate::error::{Error, Result};
use crate::models::CatalogItem;
use crate::store::{bounded, CatalogStore, SearchFilter};

/// Serialize `items`, header first, every field double-quoted
pub fn write_csv(items: &[CatalogItem]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_COLUMNS)?;
    for item in items {
        let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
        writer.write_record([
            item.code.clone().unwrap_or_default(),
            item.name.clone(),
            item.level.to_string(),
            tags.join(";"),
            Value::Object(item.context.clone()).to_string(),
            Value::Object(item.attributes.clone()).to_string(),
            item.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            item.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("failed to flush CSV writer: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV output is not UTF-8: {}", e)))
}

/// Export the whole catalog, unfiltered
pub async fn export_csv(store: &dyn CatalogStore, request_timeout: Duration) -> Result<String> {
    let items = bounded(request_timeout, store.search_items(&SearchFilter::default())).await?;
    info!(items = items.len(), "Exporting catalog CSV");
    write_csv(&items)
}
