//! Embedded SQLite catalog store
//!
//! Implements the catalog procedures locally: upsert by code, cascade
//! delete, attach/move guarded by the containment matrix and a cycle check,
//! retagging, prices, and an audit entry for every mutation.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CatalogStore, SearchFilter};
use crate::classify::tag_kind;
use crate::containment::{can_contain, check_containment};
use crate::error::{Error, Result};
use crate::models::{
    AuditLog, AuditStatus, CatalogItem, CatalogTag, ItemPayload, ItemRelations, JsonMap, Level,
    Outcome, SellableItem, TagKind, DEFAULT_RELATION,
};
use crate::text::{check_tag_names, fold};

/// Separator for tag names packed by `group_concat` (ASCII unit separator)
const TAG_SEPARATOR: char = '\u{1f}';

const ITEM_SELECT: &str = "SELECT i.id, i.code, i.name, i.level, i.context, i.attributes, \
     i.created_at, i.updated_at, \
     (SELECT group_concat(t.name, char(31)) FROM item_tags it JOIN tags t ON t.id = it.tag_id \
      WHERE it.item_id = i.id) AS tag_list \
     FROM items i";

/// Minimal identity of a stored item
#[derive(Debug, Clone)]
struct ItemRef {
    id: String,
    code: Option<String>,
    level: Level,
}

/// SQLite-backed [`CatalogStore`]
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an initialized pool (schema must exist)
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open or create the database file and its schema
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(crate::db::init_database(db_path).await?))
    }

    /// Fresh in-memory catalog
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(crate::db::init_memory_database().await?))
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Transaction that holds the write lock from its first statement
    ///
    /// A deferred transaction that reads before writing cannot wait on
    /// `busy_timeout` when upgrading; it fails with SQLITE_BUSY instead.
    /// The empty UPDATE takes the lock up front, where the timeout applies.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE items SET updated_at = updated_at WHERE 0")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Record the outcome of a mutation, then hand the result back unchanged
    async fn audited<T>(
        &self,
        item_code: Option<&str>,
        action: &str,
        payload: Value,
        result: Result<Outcome<T>>,
    ) -> Result<Outcome<T>> {
        let (status, message) = match &result {
            Ok(outcome) => (AuditStatus::Success, outcome.message.clone()),
            Err(e) => (AuditStatus::Error, e.to_string()),
        };

        let entry = sqlx::query(
            "INSERT INTO audit_logs (id, item_code, action, payload, status, message, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(item_code)
        .bind(action)
        .bind(payload.to_string())
        .bind(status.as_str())
        .bind(&message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = entry {
            warn!(action, error = %e, "Failed to append audit entry");
        }
        match &result {
            Ok(_) => debug!(action, code = ?item_code, "{}", message),
            Err(_) => info!(action, code = ?item_code, error = %message, "Store operation failed"),
        }

        result
    }

    async fn upsert(&self, payload: &ItemPayload) -> Result<Outcome<CatalogItem>> {
        let name = payload.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("item name is required".to_string()));
        }
        let code = normalize_code(payload.code.as_deref());
        let context = Value::Object(payload.context.clone()).to_string();
        let attributes = Value::Object(payload.attributes.clone()).to_string();
        let search_text = search_text(name, code.as_deref());
        let now = Utc::now();

        let mut tx = self.begin_write().await?;

        let existing = match code.as_deref() {
            Some(code) => find_item_ref(&mut tx, code).await?,
            None => None,
        };

        let (item_id, message, warnings) = match existing {
            Some(current) => {
                sqlx::query(
                    "UPDATE items SET name = ?, level = ?, context = ?, attributes = ?,
                     search_text = ?, updated_at = ? WHERE id = ?",
                )
                .bind(name)
                .bind(payload.level.as_str())
                .bind(&context)
                .bind(&attributes)
                .bind(&search_text)
                .bind(now)
                .bind(&current.id)
                .execute(&mut *tx)
                .await?;

                let warnings = if current.level != payload.level {
                    relation_conflicts(&mut tx, &current.id, payload.level).await?
                } else {
                    Vec::new()
                };
                (current.id, "Item updated", warnings)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query(
                    "INSERT INTO items (id, code, name, level, context, attributes, search_text, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(code.as_deref())
                .bind(name)
                .bind(payload.level.as_str())
                .bind(&context)
                .bind(&attributes)
                .bind(&search_text)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| constraint_to_rejection(e, "item code already exists"))?;
                (id, "Item created", Vec::new())
            }
        };

        replace_tags(&mut tx, &item_id, &payload.tags).await?;
        tx.commit().await?;

        let item = self.item_by_id(&item_id).await?;
        Ok(Outcome::new(item, message).with_warnings(warnings))
    }

    async fn delete(&self, code: &str, cascade: bool) -> Result<Outcome<u64>> {
        let mut tx = self.begin_write().await?;
        let root = require_item(&mut tx, code).await?;

        let children: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM item_relations WHERE parent_id = ?")
                .bind(&root.id)
                .fetch_one(&mut *tx)
                .await?;

        if children > 0 && !cascade {
            return Err(Error::Rejected(format!(
                "item '{}' has {} child item(s); delete with cascade to remove them",
                code, children
            )));
        }

        let doomed = if cascade {
            owned_subtree(&mut tx, &root.id).await?
        } else {
            HashSet::from([root.id.clone()])
        };

        let shared = if cascade {
            let descendants = descendant_ids(&mut tx, &root.id).await?;
            descendants.difference(&doomed).count()
        } else {
            0
        };

        for id in &doomed {
            sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let removed = doomed.len() as u64;
        let mut warnings = Vec::new();
        if shared > 0 {
            warnings.push(format!(
                "{} descendant(s) also belong to other parents and were kept",
                shared
            ));
        }
        Ok(Outcome::new(removed, format!("Deleted {} item(s)", removed)).with_warnings(warnings))
    }

    async fn attach(&self, parent_code: &str, child_code: &str, relation: &str) -> Result<Outcome<()>> {
        let relation = if relation.trim().is_empty() {
            DEFAULT_RELATION
        } else {
            relation.trim()
        };

        let mut tx = self.begin_write().await?;
        let parent = require_item(&mut tx, parent_code).await?;
        let child = require_item(&mut tx, child_code).await?;
        ensure_placement(&mut tx, &parent, &child).await?;

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM item_relations WHERE parent_id = ? AND child_id = ?",
        )
        .bind(&parent.id)
        .bind(&child.id)
        .fetch_one(&mut *tx)
        .await?;

        if exists > 0 {
            return Ok(Outcome::new((), "Relation already exists").with_warnings(vec![format!(
                "'{}' is already attached to '{}'",
                child_code, parent_code
            )]));
        }

        sqlx::query(
            "INSERT INTO item_relations (parent_id, child_id, relation, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&parent.id)
        .bind(&child.id)
        .bind(relation)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Outcome::new(
            (),
            format!("Attached '{}' to '{}'", child_code, parent_code),
        ))
    }

    async fn reparent(&self, child_code: &str, from_code: &str, to_code: &str) -> Result<Outcome<()>> {
        let mut tx = self.begin_write().await?;
        let child = require_item(&mut tx, child_code).await?;
        let from = require_item(&mut tx, from_code).await?;
        let to = require_item(&mut tx, to_code).await?;

        let relation: Option<String> = sqlx::query_scalar(
            "SELECT relation FROM item_relations WHERE parent_id = ? AND child_id = ?",
        )
        .bind(&from.id)
        .bind(&child.id)
        .fetch_optional(&mut *tx)
        .await?;
        let relation = relation.ok_or_else(|| {
            Error::NotFound(format!("'{}' is not a child of '{}'", child_code, from_code))
        })?;

        if from.id == to.id {
            return Ok(Outcome::new((), "Item already under target parent").with_warnings(vec![
                format!("'{}' is already a child of '{}'", child_code, to_code),
            ]));
        }

        ensure_placement(&mut tx, &to, &child).await?;

        sqlx::query("DELETE FROM item_relations WHERE parent_id = ? AND child_id = ?")
            .bind(&from.id)
            .bind(&child.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT OR IGNORE INTO item_relations (parent_id, child_id, relation, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&to.id)
        .bind(&child.id)
        .bind(&relation)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Outcome::new(
            (),
            format!("Moved '{}' from '{}' to '{}'", child_code, from_code, to_code),
        ))
    }

    async fn retag(&self, code: &str, tags: &BTreeSet<String>) -> Result<Outcome<CatalogItem>> {
        let mut tx = self.begin_write().await?;
        let item = require_item(&mut tx, code).await?;
        replace_tags(&mut tx, &item.id, tags).await?;
        sqlx::query("UPDATE items SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(&item.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let item = self.item_by_id(&item.id).await?;
        Ok(Outcome::new(item, "Tags updated"))
    }

    async fn price(&self, code: &str, price: Option<f64>) -> Result<Outcome<()>> {
        let mut conn = self.pool.acquire().await?;
        let item = require_item(&mut conn, code).await?;

        match price {
            Some(price) => {
                if !price.is_finite() || price < 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "price must be a non-negative number, got {}",
                        price
                    )));
                }
                sqlx::query(
                    "INSERT INTO sellables (item_id, price, updated_at) VALUES (?, ?, ?)
                     ON CONFLICT(item_id) DO UPDATE SET price = excluded.price, updated_at = excluded.updated_at",
                )
                .bind(&item.id)
                .bind(price)
                .bind(Utc::now())
                .execute(&mut *conn)
                .await?;
                Ok(Outcome::new((), format!("Price of '{}' set to {:.2}", code, price)))
            }
            None => {
                sqlx::query("DELETE FROM sellables WHERE item_id = ?")
                    .bind(&item.id)
                    .execute(&mut *conn)
                    .await?;
                Ok(Outcome::new((), format!("'{}' is no longer sellable", code)))
            }
        }
    }

    async fn item_by_id(&self, id: &str) -> Result<CatalogItem> {
        let row = sqlx::query(&format!("{} WHERE i.id = ?", ITEM_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("item id {}", id)))?;
        row_to_item(&row)
    }

    async fn items_where(&self, clause: &str, id: &str) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query(&format!(
            "{} WHERE {} ORDER BY i.name ASC",
            ITEM_SELECT, clause
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_item).collect()
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn create_or_update_item(&self, payload: &ItemPayload) -> Result<Outcome<CatalogItem>> {
        let result = self.upsert(payload).await;
        let code = normalize_code(payload.code.as_deref());
        let audit_payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        self.audited(code.as_deref(), "create_or_update_item", audit_payload, result)
            .await
    }

    async fn get_item(&self, code: &str) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!("{} WHERE i.code = ?", ITEM_SELECT))
            .bind(code.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_item).transpose()
    }

    async fn delete_item(&self, code: &str, cascade: bool) -> Result<Outcome<u64>> {
        let result = self.delete(code, cascade).await;
        self.audited(
            Some(code),
            "delete_item",
            json!({ "item_code": code, "cascade_delete": cascade }),
            result,
        )
        .await
    }

    async fn search_items(&self, filter: &SearchFilter) -> Result<Vec<CatalogItem>> {
        let mut qb = QueryBuilder::<Sqlite>::new(ITEM_SELECT);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY i.created_at DESC, i.rowid DESC");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(filter.offset.unwrap_or(0));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn count_items(&self, filter: &SearchFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM items i");
        push_filter(&mut qb, filter);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn attach_child(
        &self,
        parent_code: &str,
        child_code: &str,
        relation: &str,
    ) -> Result<Outcome<()>> {
        let result = self.attach(parent_code, child_code, relation).await;
        self.audited(
            Some(child_code),
            "attach_child",
            json!({ "parent_code": parent_code, "child_code": child_code, "relation": relation }),
            result,
        )
        .await
    }

    async fn move_item(
        &self,
        child_code: &str,
        from_parent_code: &str,
        to_parent_code: &str,
    ) -> Result<Outcome<()>> {
        let result = self
            .reparent(child_code, from_parent_code, to_parent_code)
            .await;
        self.audited(
            Some(child_code),
            "move_item",
            json!({
                "child_code": child_code,
                "from_parent_code": from_parent_code,
                "to_parent_code": to_parent_code,
            }),
            result,
        )
        .await
    }

    async fn retag_item(&self, code: &str, tags: &BTreeSet<String>) -> Result<Outcome<CatalogItem>> {
        let result = self.retag(code, tags).await;
        self.audited(
            Some(code),
            "retag_item",
            json!({ "item_code": code, "new_tags": tags }),
            result,
        )
        .await
    }

    async fn get_item_relations(&self, code: &str) -> Result<ItemRelations> {
        let item = {
            let mut conn = self.pool.acquire().await?;
            require_item(&mut conn, code).await?
        };

        let parents = self
            .items_where(
                "i.id IN (SELECT parent_id FROM item_relations WHERE child_id = ?)",
                &item.id,
            )
            .await?;
        let children = self
            .items_where(
                "i.id IN (SELECT child_id FROM item_relations WHERE parent_id = ?)",
                &item.id,
            )
            .await?;

        Ok(ItemRelations { parents, children })
    }

    async fn get_all_tags(&self) -> Result<Vec<CatalogTag>> {
        let rows = sqlx::query("SELECT id, name, kind FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogTag {
                    id: parse_uuid(&row.try_get::<String, _>("id")?)?,
                    name: row.try_get("name")?,
                    kind: TagKind::parse_lossy(&row.try_get::<String, _>("kind")?),
                })
            })
            .collect()
    }

    async fn get_audit_logs(&self, item_code: Option<&str>, limit: i64) -> Result<Vec<AuditLog>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, item_code, action, payload, status, message, created_at FROM audit_logs",
        );
        if let Some(code) = item_code {
            qb.push(" WHERE item_code = ").push_bind(code.to_string());
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(limit.max(0));

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                let status: String = row.try_get("status")?;
                Ok(AuditLog {
                    id: parse_uuid(&row.try_get::<String, _>("id")?)?,
                    item_code: row.try_get("item_code")?,
                    action: row.try_get("action")?,
                    payload: serde_json::from_str(&payload).unwrap_or(Value::String(payload)),
                    status: if status == "success" {
                        AuditStatus::Success
                    } else {
                        AuditStatus::Error
                    },
                    message: row.try_get("message")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn set_price(&self, code: &str, price: Option<f64>) -> Result<Outcome<()>> {
        let result = self.price(code, price).await;
        self.audited(
            Some(code),
            "set_price",
            json!({ "item_code": code, "price": price }),
            result,
        )
        .await
    }

    async fn list_sellables(&self) -> Result<Vec<SellableItem>> {
        let rows = sqlx::query(
            "SELECT s.item_id, s.price, s.updated_at FROM sellables s
             JOIN items i ON i.id = s.item_id ORDER BY i.name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut sellables = Vec::with_capacity(rows.len());
        for row in rows {
            let item_id: String = row.try_get("item_id")?;
            sellables.push(SellableItem {
                item: self.item_by_id(&item_id).await?,
                price: row.try_get("price")?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(sellables)
    }
}

/// Append the WHERE clause for `filter`
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SearchFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        qb.push(" AND i.search_text LIKE ")
            .push_bind(format!("%{}%", escape_like(&fold(query))))
            .push(" ESCAPE '\\'");
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        qb.push(
            " AND EXISTS (SELECT 1 FROM item_tags it JOIN tags t ON t.id = it.tag_id \
             WHERE it.item_id = i.id AND t.name = ",
        )
        .push_bind(tag.to_string())
        .push(")");
    }
    if let Some(level) = filter.level {
        qb.push(" AND i.level = ").push_bind(level.as_str());
    }
    match filter.has_parent {
        Some(true) => {
            qb.push(" AND EXISTS (SELECT 1 FROM item_relations r WHERE r.child_id = i.id)");
        }
        Some(false) => {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM item_relations r WHERE r.child_id = i.id)");
        }
        None => {}
    }
    match filter.has_children {
        Some(true) => {
            qb.push(" AND EXISTS (SELECT 1 FROM item_relations r WHERE r.parent_id = i.id)");
        }
        Some(false) => {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM item_relations r WHERE r.parent_id = i.id)");
        }
        None => {}
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn normalize_code(code: Option<&str>) -> Option<String> {
    code.map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn search_text(name: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => fold(&format!("{} {}", name, code)),
        None => fold(name),
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("corrupt id '{}': {}", raw, e)))
}

fn parse_map(raw: &str, column: &str) -> Result<JsonMap> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Internal(format!(
            "column {} holds non-object JSON: {}",
            column, other
        ))),
    }
}

fn row_to_item(row: &SqliteRow) -> Result<CatalogItem> {
    let id: String = row.try_get("id")?;
    let level: String = row.try_get("level")?;
    let context: String = row.try_get("context")?;
    let attributes: String = row.try_get("attributes")?;
    let tag_list: Option<String> = row.try_get("tag_list")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(CatalogItem {
        id: parse_uuid(&id)?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        level: level.parse()?,
        context: parse_map(&context, "context")?,
        attributes: parse_map(&attributes, "attributes")?,
        tags: tag_list
            .map(|list| list.split(TAG_SEPARATOR).map(str::to_string).collect())
            .unwrap_or_default(),
        created_at,
        updated_at,
    })
}

/// Map a UNIQUE violation to a store rejection
fn constraint_to_rejection(err: sqlx::Error, message: &str) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Rejected(message.to_string()),
        _ => Error::Database(err),
    }
}

async fn find_item_ref(conn: &mut SqliteConnection, code: &str) -> Result<Option<ItemRef>> {
    let row = sqlx::query("SELECT id, code, level FROM items WHERE code = ?")
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let level: String = row.try_get("level")?;
            Ok(Some(ItemRef {
                id: row.try_get("id")?,
                code: row.try_get("code")?,
                level: level.parse()?,
            }))
        }
        None => Ok(None),
    }
}

async fn require_item(conn: &mut SqliteConnection, code: &str) -> Result<ItemRef> {
    find_item_ref(conn, code)
        .await?
        .ok_or_else(|| Error::NotFound(format!("item '{}'", code)))
}

/// Containment and acyclicity checks for placing `child` under `parent`
async fn ensure_placement(conn: &mut SqliteConnection, parent: &ItemRef, child: &ItemRef) -> Result<()> {
    if parent.id == child.id {
        return Err(Error::Cycle(format!(
            "item '{}' cannot contain itself",
            parent.code.as_deref().unwrap_or(&parent.id)
        )));
    }
    check_containment(parent.level, child.level)?;
    if descendant_ids(conn, &child.id).await?.contains(&parent.id) {
        return Err(Error::Cycle(format!(
            "'{}' is a descendant of '{}'",
            parent.code.as_deref().unwrap_or(&parent.id),
            child.code.as_deref().unwrap_or(&child.id)
        )));
    }
    Ok(())
}

async fn child_ids(conn: &mut SqliteConnection, parent_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar("SELECT child_id FROM item_relations WHERE parent_id = ?")
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

async fn parent_ids(conn: &mut SqliteConnection, child_id: &str) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar("SELECT parent_id FROM item_relations WHERE child_id = ?")
        .bind(child_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(ids)
}

/// Every item reachable below `root_id`
async fn descendant_ids(conn: &mut SqliteConnection, root_id: &str) -> Result<HashSet<String>> {
    let mut seen = HashSet::new();
    let mut to_visit = vec![root_id.to_string()];

    while let Some(current) = to_visit.pop() {
        for child in child_ids(conn, &current).await? {
            if seen.insert(child.clone()) {
                to_visit.push(child);
            }
        }
    }

    Ok(seen)
}

/// `root_id` plus the descendants whose parents all lie inside the set
async fn owned_subtree(conn: &mut SqliteConnection, root_id: &str) -> Result<HashSet<String>> {
    let candidates = descendant_ids(conn, root_id).await?;
    let mut owned = HashSet::from([root_id.to_string()]);

    loop {
        let mut grew = false;
        for id in &candidates {
            if owned.contains(id) {
                continue;
            }
            let parents = parent_ids(conn, id).await?;
            if parents.iter().all(|p| owned.contains(p)) {
                owned.insert(id.clone());
                grew = true;
            }
        }
        if !grew {
            return Ok(owned);
        }
    }
}

/// Warnings for relations a level change has made illegal
async fn relation_conflicts(conn: &mut SqliteConnection, item_id: &str, level: Level) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    let rows = sqlx::query(
        "SELECT i.code, i.name, i.level FROM item_relations r JOIN items i ON i.id = r.child_id
         WHERE r.parent_id = ?",
    )
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        let child_level: Level = row.try_get::<String, _>("level")?.parse()?;
        if !can_contain(level, child_level) {
            let label: Option<String> = row.try_get("code")?;
            let name: String = row.try_get("name")?;
            warnings.push(format!(
                "existing child '{}' ({}) is not allowed under {}",
                label.unwrap_or(name),
                child_level,
                level
            ));
        }
    }

    let rows = sqlx::query(
        "SELECT i.code, i.name, i.level FROM item_relations r JOIN items i ON i.id = r.parent_id
         WHERE r.child_id = ?",
    )
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;
    for row in rows {
        let parent_level: Level = row.try_get::<String, _>("level")?.parse()?;
        if !can_contain(parent_level, level) {
            let label: Option<String> = row.try_get("code")?;
            let name: String = row.try_get("name")?;
            warnings.push(format!(
                "existing parent '{}' ({}) cannot contain {}",
                label.unwrap_or(name),
                parent_level,
                level
            ));
        }
    }

    Ok(warnings)
}

/// Replace the tag set of an item, creating unseen tags
async fn replace_tags(conn: &mut SqliteConnection, item_id: &str, tags: &BTreeSet<String>) -> Result<()> {
    check_tag_names(tags)?;
    sqlx::query("DELETE FROM item_tags WHERE item_id = ?")
        .bind(item_id)
        .execute(&mut *conn)
        .await?;

    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        sqlx::query("INSERT OR IGNORE INTO tags (id, name, kind, created_at) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(tag)
            .bind(tag_kind(tag).as_str())
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO item_tags (item_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
        )
        .bind(item_id)
        .bind(tag)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_search_text_folds_name_and_code() {
        assert_eq!(search_text("Pistão", Some("P-01")), "pistao p-01");
        assert_eq!(search_text("Anel", None), "anel");
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(Some("  ")), None);
        assert_eq!(normalize_code(Some(" A1 ")), Some("A1".to_string()));
        assert_eq!(normalize_code(None), None);
    }
}
