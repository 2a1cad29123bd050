//! Remote catalog store
//!
//! Talks to a hosted PostgREST-style backend: mutations and search go
//! through `rest/v1/rpc/<procedure>` and answer with the
//! [`CatalogResponse`] envelope; reads of tags, audit entries and relations
//! query the tables directly.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogStore, SearchFilter};
use crate::config::RpcConfig;
use crate::error::{Error, Result};
use crate::models::{
    AuditLog, AuditStatus, CatalogItem, CatalogResponse, CatalogTag, ItemPayload, ItemRelations,
    Outcome, TagKind,
};

const USER_AGENT: &str = concat!("pcat/", env!("CARGO_PKG_VERSION"));

/// Tag row as stored remotely; `kind` is free text there
#[derive(Debug, Deserialize)]
struct TagRow {
    id: Uuid,
    name: String,
    #[serde(default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct AuditRow {
    id: Uuid,
    item_code: Option<String>,
    action: String,
    #[serde(default)]
    payload: Value,
    status: String,
    message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct ParentEmbed {
    parent: Option<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct ChildEmbed {
    child: Option<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    parent_id: Uuid,
    child_id: Uuid,
}

/// [`CatalogStore`] backed by a hosted RPC endpoint
pub struct RpcStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl RpcStore {
    /// Build a client for the validated `config`; every request is bounded
    /// by `timeout`
    pub fn new(config: RpcConfig, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rpc_url(&self, procedure: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, procedure)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout)
        } else {
            Error::from(err)
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Invoke a stored procedure and unwrap its envelope
    async fn call<T: DeserializeOwned>(
        &self,
        procedure: &str,
        params: Value,
    ) -> Result<Outcome<Option<T>>> {
        debug!(procedure, "Calling remote procedure");
        let request = self.http_client.post(self.rpc_url(procedure)).json(&params);
        let response: CatalogResponse<T> = self.send(request).await?;
        response.into_outcome()
    }

    /// Read rows of a table with PostgREST query parameters
    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        debug!(table, "Querying remote table");
        let request = self.http_client.get(self.table_url(table)).query(query);
        self.send(request).await
    }

    async fn edges(&self) -> Result<Vec<Edge>> {
        self.select("item_relations", &[("select", "parent_id,child_id".to_string())])
            .await
    }

    async fn require_item(&self, code: &str) -> Result<CatalogItem> {
        self.get_item(code)
            .await?
            .ok_or_else(|| Error::NotFound(format!("item '{}'", code)))
    }

    /// Search through the procedure, then apply the relation facets locally
    async fn filtered(&self, filter: &SearchFilter) -> Result<Vec<CatalogItem>> {
        let outcome: Outcome<Option<Vec<CatalogItem>>> = self
            .call(
                "search_items",
                json!({
                    "q": filter.query,
                    "tag": filter.tag,
                    "level": filter.level.map(|l| l.as_str()),
                }),
            )
            .await?;
        let mut items = outcome.data.unwrap_or_default();

        if filter.has_parent.is_some() || filter.has_children.is_some() {
            let edges = self.edges().await?;
            let with_parent: HashSet<Uuid> = edges.iter().map(|e| e.child_id).collect();
            let with_children: HashSet<Uuid> = edges.iter().map(|e| e.parent_id).collect();
            items.retain(|item| {
                filter
                    .has_parent
                    .map_or(true, |want| with_parent.contains(&item.id) == want)
                    && filter
                        .has_children
                        .map_or(true, |want| with_children.contains(&item.id) == want)
            });
        }

        Ok(items)
    }
}

/// Map a non-2xx response to the catalog error it stands for
fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = remote_message(body);
    match status {
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Error::Config(format!("store credentials rejected: {}", detail))
        }
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::Rejected(detail)
        }
        _ => Error::Remote(format!("HTTP {}: {}", status.as_u16(), detail)),
    }
}

/// `message` of a PostgREST error body, or the raw body
fn remote_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Count reported by `delete_item`, which answers with a bare number or
/// `{"deleted": n}`
fn deleted_count(data: Option<&Value>) -> u64 {
    data.and_then(|v| {
        v.as_u64()
            .or_else(|| v.get("deleted").and_then(Value::as_u64))
    })
    .unwrap_or(1)
}

#[async_trait]
impl CatalogStore for RpcStore {
    async fn create_or_update_item(&self, payload: &ItemPayload) -> Result<Outcome<CatalogItem>> {
        let outcome: Outcome<Option<CatalogItem>> = self
            .call("create_or_update_item", json!({ "payload": payload }))
            .await?;

        match outcome.data {
            Some(item) => Ok(Outcome {
                data: item,
                message: outcome.message,
                warnings: outcome.warnings,
            }),
            None => Err(Error::Remote(
                "create_or_update_item returned no item".to_string(),
            )),
        }
    }

    async fn get_item(&self, code: &str) -> Result<Option<CatalogItem>> {
        let mut rows: Vec<CatalogItem> = self
            .select(
                "items",
                &[
                    ("select", "*".to_string()),
                    ("code", format!("eq.{}", code.trim())),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.pop())
    }

    async fn delete_item(&self, code: &str, cascade: bool) -> Result<Outcome<u64>> {
        let outcome: Outcome<Option<Value>> = self
            .call(
                "delete_item",
                json!({ "item_code": code, "cascade_delete": cascade }),
            )
            .await?;
        let removed = deleted_count(outcome.data.as_ref());
        Ok(outcome.map(|_| removed))
    }

    async fn search_items(&self, filter: &SearchFilter) -> Result<Vec<CatalogItem>> {
        let items = self.filtered(filter).await?;
        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let page = match filter.limit {
            Some(limit) => items
                .into_iter()
                .skip(offset)
                .take(limit.max(0) as usize)
                .collect(),
            None => items,
        };
        Ok(page)
    }

    async fn count_items(&self, filter: &SearchFilter) -> Result<i64> {
        Ok(self.filtered(&filter.unpaged()).await?.len() as i64)
    }

    async fn attach_child(
        &self,
        parent_code: &str,
        child_code: &str,
        relation: &str,
    ) -> Result<Outcome<()>> {
        let outcome: Outcome<Option<Value>> = self
            .call(
                "attach_child",
                json!({
                    "parent_code": parent_code,
                    "child_code": child_code,
                    "relation": relation,
                }),
            )
            .await?;
        Ok(outcome.map(|_| ()))
    }

    async fn move_item(
        &self,
        child_code: &str,
        from_parent_code: &str,
        to_parent_code: &str,
    ) -> Result<Outcome<()>> {
        let outcome: Outcome<Option<Value>> = self
            .call(
                "move_item",
                json!({
                    "child_code": child_code,
                    "from_parent_code": from_parent_code,
                    "to_parent_code": to_parent_code,
                }),
            )
            .await?;
        Ok(outcome.map(|_| ()))
    }

    async fn retag_item(&self, code: &str, tags: &BTreeSet<String>) -> Result<Outcome<CatalogItem>> {
        let outcome: Outcome<Option<CatalogItem>> = self
            .call(
                "retag_item",
                json!({ "item_code": code, "new_tags": tags }),
            )
            .await?;

        let item = match outcome.data {
            Some(item) => item,
            None => self.require_item(code).await?,
        };
        Ok(Outcome {
            data: item,
            message: outcome.message,
            warnings: outcome.warnings,
        })
    }

    async fn get_item_relations(&self, code: &str) -> Result<ItemRelations> {
        let item = self.require_item(code).await?;
        let id = format!("eq.{}", item.id);

        let parents: Vec<ParentEmbed> = self
            .select(
                "item_relations",
                &[("select", "parent:parent_id(*)".to_string()), ("child_id", id.clone())],
            )
            .await?;
        let children: Vec<ChildEmbed> = self
            .select(
                "item_relations",
                &[("select", "child:child_id(*)".to_string()), ("parent_id", id)],
            )
            .await?;

        Ok(ItemRelations {
            parents: parents.into_iter().filter_map(|r| r.parent).collect(),
            children: children.into_iter().filter_map(|r| r.child).collect(),
        })
    }

    async fn get_all_tags(&self) -> Result<Vec<CatalogTag>> {
        let rows: Vec<TagRow> = self
            .select(
                "tags",
                &[("select", "*".to_string()), ("order", "name.asc".to_string())],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogTag {
                id: row.id,
                kind: TagKind::parse_lossy(&row.kind),
                name: row.name,
            })
            .collect())
    }

    async fn get_audit_logs(&self, item_code: Option<&str>, limit: i64) -> Result<Vec<AuditLog>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.max(0).to_string()),
        ];
        if let Some(code) = item_code {
            query.push(("item_code", format!("eq.{}", code)));
        }

        let rows: Vec<AuditRow> = self.select("audit_logs", &query).await?;
        Ok(rows
            .into_iter()
            .map(|row| AuditLog {
                id: row.id,
                item_code: row.item_code,
                action: row.action,
                payload: row.payload,
                status: if row.status == "success" {
                    AuditStatus::Success
                } else {
                    AuditStatus::Error
                },
                message: row.message,
                created_at: row.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RpcStore {
        RpcStore::new(
            RpcConfig {
                url: "https://catalog.example.com/".to_string(),
                api_key: "test-key".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let store = store();
        assert_eq!(store.base_url(), "https://catalog.example.com");
        assert_eq!(
            store.rpc_url("attach_child"),
            "https://catalog.example.com/rest/v1/rpc/attach_child"
        );
        assert_eq!(
            store.table_url("audit_logs"),
            "https://catalog.example.com/rest/v1/audit_logs"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "{}"),
            Error::Config(_)
        ));
        match status_error(StatusCode::CONFLICT, r#"{"message":"duplicate key"}"#) {
            Error::Rejected(msg) => assert_eq!(msg, "duplicate key"),
            other => panic!("expected Rejected, got {:?}", other),
        }
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream down"),
            Error::Remote(_)
        ));
    }

    #[test]
    fn test_deleted_count_shapes() {
        assert_eq!(deleted_count(Some(&json!(3))), 3);
        assert_eq!(deleted_count(Some(&json!({"deleted": 4}))), 4);
        assert_eq!(deleted_count(None), 1);
    }

    #[test]
    fn test_search_envelope_decodes_items() {
        let body = r#"{
            "status": "success",
            "message": "2 items",
            "data": [
                {"id": "6f1c1b1e-8a43-4a55-9a53-6b1f3f6a0001", "code": "MTR-1",
                 "name": "Motor diesel", "level": "Equipamento",
                 "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"}
            ]
        }"#;
        let response: CatalogResponse<Vec<CatalogItem>> = serde_json::from_str(body).unwrap();
        let outcome = response.into_outcome().unwrap();
        let items = outcome.data.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].code.as_deref(), Some("MTR-1"));
        assert!(items[0].tags.is_empty());
    }
}
