//! Catalog store interface
//!
//! The store owns all persisted catalog state (items, tags, relations, audit
//! trail). Everything above it only builds requests and interprets results.
//! Implementations:
//! - [`SqliteStore`]: embedded database
//! - [`RpcStore`]: hosted backend reached over RPC

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{CatalogConfig, StoreBackend};
use crate::error::{Error, Result};
use crate::models::{
    AuditLog, CatalogItem, CatalogTag, ItemPayload, ItemRelations, Level, Outcome, SellableItem,
};

pub mod rpc;
pub mod sqlite;

pub use rpc::RpcStore;
pub use sqlite::SqliteStore;

/// Conjunctive item filter; every `None` field is unconstrained
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Case- and accent-insensitive substring of name or code
    pub query: Option<String>,
    /// Exact tag name the item must carry
    pub tag: Option<String>,
    /// Exact level
    pub level: Option<Level>,
    /// Only items that are (or are not) somebody's child
    pub has_parent: Option<bool>,
    /// Only items that do (or do not) have children
    pub has_children: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SearchFilter {
    /// Filter on the three primary facets, blank strings meaning "any"
    pub fn new(query: Option<&str>, tag: Option<&str>, level: Option<Level>) -> Self {
        Self {
            query: non_blank(query),
            tag: non_blank(tag),
            level,
            ..Default::default()
        }
    }

    /// Copy of the filter without pagination
    pub fn unpaged(&self) -> Self {
        Self {
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    pub fn with_page(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Operations consumed from the catalog store
///
/// Mutations append to the audit trail on success and on failure.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert an item, or update the item whose `code` matches
    async fn create_or_update_item(&self, payload: &ItemPayload) -> Result<Outcome<CatalogItem>>;

    /// Item with the given code
    async fn get_item(&self, code: &str) -> Result<Option<CatalogItem>>;

    /// Delete an item; `cascade` also removes descendants owned only by it.
    /// Returns the number of items removed.
    async fn delete_item(&self, code: &str, cascade: bool) -> Result<Outcome<u64>>;

    /// Items matching `filter`, newest first
    async fn search_items(&self, filter: &SearchFilter) -> Result<Vec<CatalogItem>>;

    /// Number of items matching `filter`, ignoring pagination
    async fn count_items(&self, filter: &SearchFilter) -> Result<i64>;

    /// Link `child_code` under `parent_code`
    async fn attach_child(
        &self,
        parent_code: &str,
        child_code: &str,
        relation: &str,
    ) -> Result<Outcome<()>>;

    /// Re-parent `child_code` from one parent to another
    async fn move_item(
        &self,
        child_code: &str,
        from_parent_code: &str,
        to_parent_code: &str,
    ) -> Result<Outcome<()>>;

    /// Replace the tag set of an item
    async fn retag_item(&self, code: &str, tags: &BTreeSet<String>) -> Result<Outcome<CatalogItem>>;

    /// Direct parents and children of an item
    async fn get_item_relations(&self, code: &str) -> Result<ItemRelations>;

    /// Whole tag vocabulary, by name
    async fn get_all_tags(&self) -> Result<Vec<CatalogTag>>;

    /// Audit entries, newest first
    async fn get_audit_logs(&self, item_code: Option<&str>, limit: i64) -> Result<Vec<AuditLog>>;

    /// Set (`Some`) or clear (`None`) the sale price of an item
    async fn set_price(&self, code: &str, _price: Option<f64>) -> Result<Outcome<()>> {
        Err(Error::Unsupported(format!(
            "this store does not track prices (item '{}')",
            code
        )))
    }

    /// Items carrying a sale price
    async fn list_sellables(&self) -> Result<Vec<SellableItem>> {
        Err(Error::Unsupported(
            "this store does not track prices".to_string(),
        ))
    }
}

/// Store handle shared by the facade and request handlers
pub type SharedStore = Arc<dyn CatalogStore>;

/// Run one store call, failing with [`Error::Timeout`] past `limit`
pub async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| Error::Timeout(limit))?
}

/// Open the store selected by `config`
///
/// Configuration errors (missing or placeholder credentials) surface here,
/// once, before any catalog operation runs.
pub async fn open_store(config: &CatalogConfig) -> Result<SharedStore> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            let path = config.database_path();
            let store = SqliteStore::open(&path).await?;
            info!("Using SQLite catalog store at {}", path.display());
            Ok(Arc::new(store))
        }
        StoreBackend::Rpc => {
            let rpc = config.store.rpc_config()?;
            let store = RpcStore::new(rpc, config.request_timeout())?;
            info!("Using remote catalog store at {}", store.base_url());
            Ok(Arc::new(store))
        }
    }
}
