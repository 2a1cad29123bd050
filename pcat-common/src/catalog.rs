//! Catalog facade
//!
//! Single entry point for callers (HTTP handlers, CLI). Holds the injected
//! store handle and bounds every store request by the configured timeout.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::classify::{infer_level, LevelInference};
use crate::config::{CatalogConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::csv::{self as catalog_csv, CsvValidation, ImportResult};
use crate::error::{Error, Result};
use crate::models::{
    AuditLog, CatalogItem, CatalogTag, ItemDraft, ItemRelations, Level, Outcome, SellableItem,
    DEFAULT_RELATION,
};
use crate::store::{bounded, open_store, SearchFilter, SharedStore};
use crate::text::check_tag_names;

/// Default number of audit entries returned
pub const DEFAULT_AUDIT_LIMIT: i64 = 100;

/// Tunables of the facade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Deadline for each individual store request
    pub request_timeout: Duration,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

/// Catalog operations over an injected store
#[derive(Clone)]
pub struct Catalog {
    store: SharedStore,
    options: CatalogOptions,
}

impl Catalog {
    pub fn new(store: SharedStore, options: CatalogOptions) -> Self {
        Self { store, options }
    }

    /// Open the configured store and wrap it
    pub async fn from_config(config: &CatalogConfig) -> Result<Self> {
        let store = open_store(config).await?;
        Ok(Self::new(
            store,
            CatalogOptions {
                request_timeout: config.request_timeout(),
            },
        ))
    }

    fn limit(&self) -> Duration {
        self.options.request_timeout
    }

    /// Items matching every supplied filter, newest first
    pub async fn search(
        &self,
        query: Option<&str>,
        tag: Option<&str>,
        level: Option<Level>,
    ) -> Result<Vec<CatalogItem>> {
        self.search_filtered(&SearchFilter::new(query, tag, level))
            .await
    }

    pub async fn search_filtered(&self, filter: &SearchFilter) -> Result<Vec<CatalogItem>> {
        bounded(self.limit(), self.store.search_items(filter)).await
    }

    /// Matches of `filter` across all pages
    pub async fn count(&self, filter: &SearchFilter) -> Result<i64> {
        bounded(self.limit(), self.store.count_items(&filter.unpaged())).await
    }

    pub async fn get_item(&self, code: &str) -> Result<CatalogItem> {
        bounded(self.limit(), self.store.get_item(code))
            .await?
            .ok_or_else(|| Error::NotFound(format!("item '{}'", code)))
    }

    /// Direct parents and children of `code`
    pub async fn item_relations(&self, code: &str) -> Result<ItemRelations> {
        bounded(self.limit(), self.store.get_item_relations(code)).await
    }

    /// Create or update an item, inferring its level when not given
    ///
    /// An uncertain classification is returned as a warning alongside the
    /// stored item.
    pub async fn create_item(&self, draft: ItemDraft) -> Result<Outcome<CatalogItem>> {
        if draft.name.trim().is_empty() {
            return Err(Error::InvalidInput("item name is required".to_string()));
        }
        check_tag_names(&draft.tags)?;

        let name = draft.name.clone();
        let (payload, inference) = draft.resolve();
        debug!(name = %name, level = %inference.level, source = ?inference.source, "Resolved item level");

        let mut outcome = bounded(self.limit(), self.store.create_or_update_item(&payload)).await?;
        if let Some(warning) = inference.warning(&name) {
            warn!("{}", warning);
            outcome.warnings.insert(0, warning);
        }
        Ok(outcome)
    }

    pub async fn delete_item(&self, code: &str, cascade: bool) -> Result<Outcome<u64>> {
        bounded(self.limit(), self.store.delete_item(code, cascade)).await
    }

    /// Link `child_code` under `parent_code` (relation defaults to `contains`)
    ///
    /// Containment and cycles are enforced by the store, which also records
    /// rejected attempts in the audit trail.
    pub async fn attach_child(
        &self,
        parent_code: &str,
        child_code: &str,
        relation: Option<&str>,
    ) -> Result<Outcome<()>> {
        let relation = relation
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RELATION);
        bounded(
            self.limit(),
            self.store.attach_child(parent_code, child_code, relation),
        )
        .await
    }

    pub async fn move_item(
        &self,
        child_code: &str,
        from_parent_code: &str,
        to_parent_code: &str,
    ) -> Result<Outcome<()>> {
        bounded(
            self.limit(),
            self.store
                .move_item(child_code, from_parent_code, to_parent_code),
        )
        .await
    }

    /// Replace the tag set of `code`
    pub async fn retag_item<I, T>(&self, code: &str, tags: I) -> Result<Outcome<CatalogItem>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let tags: BTreeSet<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        check_tag_names(&tags)?;
        bounded(self.limit(), self.store.retag_item(code, &tags)).await
    }

    pub async fn tags(&self) -> Result<Vec<CatalogTag>> {
        bounded(self.limit(), self.store.get_all_tags()).await
    }

    /// Audit entries, newest first; `limit` defaults to 100
    pub async fn audit_logs(&self, item_code: Option<&str>, limit: Option<i64>) -> Result<Vec<AuditLog>> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).max(0);
        let item_code = item_code.map(str::trim).filter(|c| !c.is_empty());
        bounded(self.limit(), self.store.get_audit_logs(item_code, limit)).await
    }

    /// Set or clear (`None`) the sale price of an item
    pub async fn set_price(&self, code: &str, price: Option<f64>) -> Result<Outcome<()>> {
        bounded(self.limit(), self.store.set_price(code, price)).await
    }

    pub async fn sellables(&self) -> Result<Vec<SellableItem>> {
        bounded(self.limit(), self.store.list_sellables()).await
    }

    /// Import a CSV text; see [`crate::csv::import_csv`]
    pub async fn import_csv(&self, text: &str) -> ImportResult {
        catalog_csv::import_csv(self.store.as_ref(), text, self.limit()).await
    }

    pub fn validate_csv(&self, text: &str) -> CsvValidation {
        catalog_csv::validate_csv(text)
    }

    pub async fn export_csv(&self) -> Result<String> {
        catalog_csv::export_csv(self.store.as_ref(), self.limit()).await
    }

    /// Level inference without touching the store
    pub fn classify<I, T>(&self, name: &str, tags: I, explicit: Option<Level>, is_kit: bool) -> LevelInference
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        infer_level(name, tags, explicit, is_kit)
    }
}
