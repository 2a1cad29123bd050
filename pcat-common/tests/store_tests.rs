//! SQLite store behaviour: upsert, hierarchy rules, cascade delete, search,
//! audit trail and prices

use std::collections::BTreeSet;

use pcat_common::models::{AuditStatus, ItemPayload, JsonMap, TagKind};
use pcat_common::store::{SearchFilter, SqliteStore};
use pcat_common::{CatalogStore, Error, Level};
use serde_json::json;

async fn store() -> SqliteStore {
    SqliteStore::in_memory().await.expect("in-memory store")
}

fn payload(code: &str, name: &str, level: Level) -> ItemPayload {
    ItemPayload {
        code: Some(code.to_string()),
        name: name.to_string(),
        level,
        context: JsonMap::new(),
        attributes: JsonMap::new(),
        tags: BTreeSet::new(),
    }
}

fn tagged(code: &str, name: &str, level: Level, tags: &[&str]) -> ItemPayload {
    ItemPayload {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..payload(code, name, level)
    }
}

async fn put(store: &SqliteStore, item: ItemPayload) {
    store
        .create_or_update_item(&item)
        .await
        .expect("create item");
}

// ============================================================================
// Create / update
// ============================================================================

#[tokio::test]
async fn test_create_then_update_by_code() {
    let store = store().await;

    let created = store
        .create_or_update_item(&tagged("MTR-1", "Motor diesel", Level::Conjunto, &["motor"]))
        .await
        .unwrap();
    assert_eq!(created.message, "Item created");
    assert_eq!(created.data.level, Level::Conjunto);

    let mut update = tagged("MTR-1", "Motor diesel 6 cil", Level::Conjunto, &["motor", "naval"]);
    update.attributes.insert("cilindros".into(), json!(6));
    let updated = store.create_or_update_item(&update).await.unwrap();

    assert_eq!(updated.message, "Item updated");
    assert_eq!(updated.data.id, created.data.id);
    assert_eq!(updated.data.name, "Motor diesel 6 cil");
    assert_eq!(updated.data.attributes.get("cilindros"), Some(&json!(6)));
    assert_eq!(updated.data.tags.len(), 2);

    let fetched = store.get_item("MTR-1").await.unwrap().unwrap();
    assert_eq!(fetched, updated.data);
}

#[tokio::test]
async fn test_items_without_code_are_distinct() {
    let store = store().await;
    let mut first = payload("x", "Arruela", Level::Peca);
    first.code = None;
    let a = store.create_or_update_item(&first).await.unwrap();
    let b = store.create_or_update_item(&first).await.unwrap();
    assert_ne!(a.data.id, b.data.id);
    assert_eq!(a.data.code, None);
}

#[tokio::test]
async fn test_blank_name_rejected_and_audited() {
    let store = store().await;
    let result = store
        .create_or_update_item(&payload("BAD", "  ", Level::Peca))
        .await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));

    let logs = store.get_audit_logs(Some("BAD"), 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, AuditStatus::Error);
}

#[tokio::test]
async fn test_level_change_warns_about_broken_relations() {
    let store = store().await;
    put(&store, payload("C-1", "Conjunto hidráulico", Level::Conjunto)).await;
    put(&store, payload("P-1", "Bomba", Level::Peca)).await;
    store.attach_child("C-1", "P-1", "contains").await.unwrap();

    let outcome = store
        .create_or_update_item(&payload("C-1", "Conjunto hidráulico", Level::Peca))
        .await
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("P-1"));
}

// ============================================================================
// Hierarchy
// ============================================================================

#[tokio::test]
async fn test_attach_respects_containment() {
    let store = store().await;
    put(&store, payload("EQ-1", "Escavadeira", Level::Equipamento)).await;
    put(&store, payload("KIT-1", "Kit juntas", Level::Kit)).await;
    put(&store, payload("P-1", "Junta", Level::Peca)).await;

    let result = store.attach_child("P-1", "EQ-1", "contains").await;
    assert!(matches!(
        result,
        Err(Error::Containment {
            parent: Level::Peca,
            child: Level::Equipamento
        })
    ));

    store.attach_child("EQ-1", "KIT-1", "contains").await.unwrap();
    store.attach_child("KIT-1", "P-1", "contains").await.unwrap();

    let relations = store.get_item_relations("KIT-1").await.unwrap();
    assert_eq!(relations.parents.len(), 1);
    assert_eq!(relations.parents[0].code.as_deref(), Some("EQ-1"));
    assert_eq!(relations.children.len(), 1);
    assert_eq!(relations.children[0].code.as_deref(), Some("P-1"));
}

#[tokio::test]
async fn test_attach_rejects_self_and_cycles() {
    let store = store().await;
    put(&store, payload("PT", "Parte traseira", Level::Parte)).await;
    put(&store, payload("KT", "Kit traseiro", Level::Kit)).await;

    assert!(matches!(
        store.attach_child("PT", "PT", "contains").await,
        Err(Error::Cycle(_))
    ));

    // Parte may hold a Kit and a Kit may hold a Parte, but not in a loop
    store.attach_child("PT", "KT", "contains").await.unwrap();
    assert!(matches!(
        store.attach_child("KT", "PT", "contains").await,
        Err(Error::Cycle(_))
    ));
}

#[tokio::test]
async fn test_duplicate_attach_is_warning() {
    let store = store().await;
    put(&store, payload("A", "Conjunto A", Level::Conjunto)).await;
    put(&store, payload("P", "Parafuso", Level::Peca)).await;

    store.attach_child("A", "P", "contains").await.unwrap();
    let again = store.attach_child("A", "P", "contains").await.unwrap();
    assert_eq!(again.warnings.len(), 1);
}

#[tokio::test]
async fn test_attach_unknown_item_is_not_found() {
    let store = store().await;
    put(&store, payload("A", "Conjunto A", Level::Conjunto)).await;
    assert!(matches!(
        store.attach_child("A", "NOPE", "contains").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_move_item_between_parents() {
    let store = store().await;
    put(&store, payload("A", "Conjunto A", Level::Conjunto)).await;
    put(&store, payload("B", "Conjunto B", Level::Conjunto)).await;
    put(&store, payload("EQ", "Trator", Level::Equipamento)).await;
    put(&store, payload("P", "Porca", Level::Peca)).await;
    store.attach_child("A", "P", "fastener").await.unwrap();

    store.move_item("P", "A", "B").await.unwrap();
    let relations = store.get_item_relations("P").await.unwrap();
    assert_eq!(relations.parents.len(), 1);
    assert_eq!(relations.parents[0].code.as_deref(), Some("B"));

    // not currently under A any more
    assert!(matches!(
        store.move_item("P", "A", "B").await,
        Err(Error::NotFound(_))
    ));

    // an Equipamento may not hold a Peça directly; nothing changes
    assert!(matches!(
        store.move_item("P", "B", "EQ").await,
        Err(Error::Containment { .. })
    ));
    let relations = store.get_item_relations("P").await.unwrap();
    assert_eq!(relations.parents.len(), 1);
    assert_eq!(relations.parents[0].code.as_deref(), Some("B"));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_with_children_requires_cascade() {
    let store = store().await;
    put(&store, payload("A", "Conjunto A", Level::Conjunto)).await;
    put(&store, payload("P", "Pistão", Level::Peca)).await;
    store.attach_child("A", "P", "contains").await.unwrap();

    assert!(matches!(
        store.delete_item("A", false).await,
        Err(Error::Rejected(_))
    ));

    let outcome = store.delete_item("A", true).await.unwrap();
    assert_eq!(outcome.data, 2);
    assert!(store.get_item("P").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cascade_keeps_shared_descendants() {
    let store = store().await;
    put(&store, payload("A", "Conjunto A", Level::Conjunto)).await;
    put(&store, payload("B", "Conjunto B", Level::Conjunto)).await;
    put(&store, payload("OWN", "Anel", Level::Peca)).await;
    put(&store, payload("SHARED", "Junta", Level::Peca)).await;
    store.attach_child("A", "OWN", "contains").await.unwrap();
    store.attach_child("A", "SHARED", "contains").await.unwrap();
    store.attach_child("B", "SHARED", "contains").await.unwrap();

    let outcome = store.delete_item("A", true).await.unwrap();
    assert_eq!(outcome.data, 2);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(store.get_item("OWN").await.unwrap().is_none());

    let shared = store.get_item_relations("SHARED").await.unwrap();
    assert_eq!(shared.parents.len(), 1);
    assert_eq!(shared.parents[0].code.as_deref(), Some("B"));
}

#[tokio::test]
async fn test_delete_missing_item() {
    let store = store().await;
    assert!(matches!(
        store.delete_item("GHOST", false).await,
        Err(Error::NotFound(_))
    ));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_filters_are_conjunctive() {
    let store = store().await;
    put(&store, tagged("P-1", "Pistão 4D80", Level::Peca, &["motor"])).await;
    put(&store, tagged("P-2", "Pistão naval", Level::Peca, &["motor", "naval"])).await;
    put(&store, tagged("C-1", "Conjunto pistão", Level::Conjunto, &["naval"])).await;

    let all = store.search_items(&SearchFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let filter = SearchFilter::new(Some("PISTAO"), Some("naval"), Some(Level::Peca));
    let hits = store.search_items(&filter).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].code.as_deref(), Some("P-2"));

    let by_code = SearchFilter::new(Some("c-1"), None, None);
    assert_eq!(store.count_items(&by_code).await.unwrap(), 1);
}

#[tokio::test]
async fn test_search_newest_first_and_paged() {
    let store = store().await;
    for i in 0..5 {
        put(&store, payload(&format!("N-{}", i), &format!("Parafuso {}", i), Level::Peca)).await;
    }

    let page = SearchFilter::default().with_page(2, 1);
    let hits = store.search_items(&page).await.unwrap();
    let codes: Vec<_> = hits.iter().filter_map(|i| i.code.clone()).collect();
    assert_eq!(codes, vec!["N-3", "N-2"]);
    assert_eq!(store.count_items(&page).await.unwrap(), 5);
}

#[tokio::test]
async fn test_search_like_wildcards_are_literal() {
    let store = store().await;
    put(&store, payload("A", "Desconto 50%", Level::Peca)).await;
    put(&store, payload("B", "Desconto 500", Level::Peca)).await;

    let hits = store
        .search_items(&SearchFilter::new(Some("50%"), None, None))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].code.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_search_relation_facets() {
    let store = store().await;
    put(&store, payload("ROOT", "Conjunto raiz", Level::Conjunto)).await;
    put(&store, payload("LEAF", "Arruela", Level::Peca)).await;
    put(&store, payload("LONE", "Porca", Level::Peca)).await;
    store.attach_child("ROOT", "LEAF", "contains").await.unwrap();

    let filter = SearchFilter {
        has_parent: Some(false),
        has_children: Some(false),
        ..Default::default()
    };
    let hits = store.search_items(&filter).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].code.as_deref(), Some("LONE"));

    let filter = SearchFilter {
        has_children: Some(true),
        ..Default::default()
    };
    assert_eq!(store.count_items(&filter).await.unwrap(), 1);
}

// ============================================================================
// Tags, audit, sellables
// ============================================================================

#[tokio::test]
async fn test_retag_and_tag_vocabulary() {
    let store = store().await;
    put(&store, tagged("P-1", "Bico injetor", Level::Peca, &["motor"])).await;

    let new_tags: BTreeSet<String> = ["naval", "caterpillar"].iter().map(|t| t.to_string()).collect();
    let outcome = store.retag_item("P-1", &new_tags).await.unwrap();
    assert_eq!(outcome.data.tags, new_tags);

    let tags = store.get_all_tags().await.unwrap();
    let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["caterpillar", "motor", "naval"]);
    let naval = tags.iter().find(|t| t.name == "naval").unwrap();
    assert_eq!(naval.kind, TagKind::Facet);
}

#[tokio::test]
async fn test_audit_trail_newest_first() {
    let store = store().await;
    put(&store, payload("A", "Conjunto A", Level::Conjunto)).await;
    put(&store, payload("P", "Porca", Level::Peca)).await;
    store.attach_child("A", "P", "contains").await.unwrap();
    let _ = store.attach_child("P", "A", "contains").await;

    let logs = store.get_audit_logs(None, 100).await.unwrap();
    assert_eq!(logs.len(), 4);
    assert_eq!(logs[0].action, "attach_child");
    assert_eq!(logs[0].status, AuditStatus::Error);
    assert_eq!(logs[3].action, "create_or_update_item");

    let limited = store.get_audit_logs(None, 2).await.unwrap();
    assert_eq!(limited.len(), 2);

    let for_a = store.get_audit_logs(Some("A"), 100).await.unwrap();
    assert_eq!(for_a.len(), 2);
    assert!(for_a.iter().all(|l| l.item_code.as_deref() == Some("A")));
}

#[tokio::test]
async fn test_prices() {
    let store = store().await;
    put(&store, payload("K-1", "Kit revisão", Level::Kit)).await;
    put(&store, payload("P-1", "Filtro", Level::Peca)).await;

    store.set_price("K-1", Some(199.9)).await.unwrap();
    assert!(matches!(
        store.set_price("P-1", Some(-1.0)).await,
        Err(Error::InvalidInput(_))
    ));

    let sellables = store.list_sellables().await.unwrap();
    assert_eq!(sellables.len(), 1);
    assert_eq!(sellables[0].item.code.as_deref(), Some("K-1"));
    assert_eq!(sellables[0].price, 199.9);

    store.set_price("K-1", None).await.unwrap();
    assert!(store.list_sellables().await.unwrap().is_empty());
}
