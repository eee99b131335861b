//! Whole-table consistency checks for the collection tree.

use std::collections::{HashMap, HashSet};

use devtools_api::{CollectionItem, Id, ItemKind};

use crate::collection_items::{Scope, order_scope, store};
use crate::storage::{Database, endpoints, folders};

/// Check every structural rule of `collection_items` and its legacy tables.
///
/// - every scope is one symmetric list walked from a unique head
/// - kind columns agree with `item_type`
/// - parents are folder items of the same collection
/// - legacy rows exist and agree on collection and parent
/// - no legacy folder or endpoint is left without an item
pub async fn check_invariants(db: &Database) -> Result<(), String> {
    let mut conn = db.acquire().await.map_err(|e| e.to_string())?;

    let ids: Vec<Vec<u8>> = sqlx::query_scalar("SELECT id FROM collection_items")
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| e.to_string())?;
    let mut items: HashMap<Id, CollectionItem> = HashMap::new();
    for raw in ids {
        let id = Id::from_bytes(&raw).map_err(|e| e.to_string())?;
        let item = store::get(&mut conn, id).await.map_err(|e| e.to_string())?;
        items.insert(id, item);
    }

    let mut scopes: HashMap<Scope, Vec<CollectionItem>> = HashMap::new();
    for item in items.values() {
        scopes.entry(Scope::of(item)).or_default().push(item.clone());
    }
    for (scope, rows) in &scopes {
        let count = rows.len();
        let ordered = order_scope(rows.clone()).map_err(|e| format!("scope {scope}: {e}"))?;
        if ordered.len() != count {
            return Err(format!("scope {scope}: walked {} of {count} rows", ordered.len()));
        }
        if ordered.last().and_then(|tail| tail.next_id).is_some() {
            return Err(format!("scope {scope}: tail has a successor"));
        }
    }

    let mut wrapped_folders = HashSet::new();
    let mut wrapped_endpoints = HashSet::new();
    for item in items.values() {
        let legacy_parent = match item.parent_folder_id {
            Some(parent_id) => {
                let parent = items
                    .get(&parent_id)
                    .ok_or_else(|| format!("item {}: parent {parent_id} missing", item.id))?;
                if !parent.is_folder() || parent.collection_id != item.collection_id {
                    return Err(format!("item {}: invalid parent {parent_id}", item.id));
                }
                parent.folder_id
            }
            None => None,
        };

        match (item.kind, item.folder_id, item.endpoint_id) {
            (ItemKind::Folder, Some(folder_id), None) => {
                let folder = folders::get(&mut conn, folder_id)
                    .await
                    .map_err(|e| format!("item {}: {e}", item.id))?;
                if folder.collection_id != item.collection_id || folder.parent_id != legacy_parent {
                    return Err(format!("item {}: legacy folder out of step", item.id));
                }
                wrapped_folders.insert(folder_id);
            }
            (ItemKind::Endpoint, None, Some(endpoint_id)) => {
                let endpoint = endpoints::get(&mut conn, endpoint_id)
                    .await
                    .map_err(|e| format!("item {}: {e}", item.id))?;
                if endpoint.collection_id != item.collection_id
                    || endpoint.folder_id != legacy_parent
                {
                    return Err(format!("item {}: legacy endpoint out of step", item.id));
                }
                wrapped_endpoints.insert(endpoint_id);
            }
            _ => return Err(format!("item {}: kind columns disagree", item.id)),
        }
    }

    let folder_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM item_folder")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| e.to_string())?;
    let endpoint_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM item_api")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| e.to_string())?;
    if folder_count as usize != wrapped_folders.len() {
        return Err(format!(
            "{} legacy folders, {} wrapped by items",
            folder_count,
            wrapped_folders.len()
        ));
    }
    if endpoint_count as usize != wrapped_endpoints.len() {
        return Err(format!(
            "{} legacy endpoints, {} wrapped by items",
            endpoint_count,
            wrapped_endpoints.len()
        ));
    }
    Ok(())
}

/// Panicking form of [`check_invariants`] for tests.
pub async fn assert_invariants(db: &Database) {
    if let Err(violation) = check_invariants(db).await {
        panic!("collection tree invariant violated: {violation}");
    }
}

/// Row-level dump of the tree and legacy tables, for before/after
/// comparisons around failing mutations.
pub async fn dump_tables(db: &Database) -> Vec<String> {
    const QUERIES: &[&str] = &[
        "SELECT 'item|' || hex(id) || '|' || hex(collection_id) || '|' || ifnull(hex(parent_folder_id), '-')
            || '|' || item_type || '|' || ifnull(hex(folder_id), '-') || '|' || ifnull(hex(endpoint_id), '-')
            || '|' || name || '|' || ifnull(hex(prev_id), '-') || '|' || ifnull(hex(next_id), '-')
         FROM collection_items ORDER BY id",
        "SELECT 'folder|' || hex(id) || '|' || hex(collection_id) || '|' || ifnull(hex(parent_id), '-')
            || '|' || name FROM item_folder ORDER BY id",
        "SELECT 'endpoint|' || hex(id) || '|' || hex(collection_id) || '|' || ifnull(hex(folder_id), '-')
            || '|' || name || '|' || method || '|' || url FROM item_api ORDER BY id",
        "SELECT 'example|' || hex(id) || '|' || hex(item_api_id) || '|' || hex(collection_id)
            || '|' || is_default || '|' || name FROM item_api_example ORDER BY id",
    ];
    let mut conn = db.acquire().await.expect("acquire failed");
    let mut rows = Vec::new();
    for query in QUERIES {
        let dumped: Vec<String> = sqlx::query_scalar(*query)
            .fetch_all(&mut *conn)
            .await
            .expect("dump query failed");
        rows.extend(dumped);
    }
    rows
}
