use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use devtools_api::{CollectionItem, Id, ItemKind};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::types::{decode_id, decode_opt_id, kind_from_i64, kind_to_i64, opt_bytes};
use crate::storage::{Result, StorageError, WriteTx, endpoints, examples, folders};

/// One linked list of the tree: the children of `parent_folder_id` inside a
/// collection, or the collection root when the parent is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope {
    pub collection_id: Id,
    /// Collection item id of the parent folder
    pub parent_folder_id: Option<Id>,
}

impl Scope {
    pub fn root(collection_id: Id) -> Self {
        Self {
            collection_id,
            parent_folder_id: None,
        }
    }

    pub fn folder(collection_id: Id, parent_folder_id: Id) -> Self {
        Self {
            collection_id,
            parent_folder_id: Some(parent_folder_id),
        }
    }

    pub fn of(item: &CollectionItem) -> Self {
        Self {
            collection_id: item.collection_id,
            parent_folder_id: item.parent_folder_id,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent_folder_id {
            Some(parent) => write!(f, "{}/{}", self.collection_id, parent),
            None => write!(f, "{}/root", self.collection_id),
        }
    }
}

/// Placement relative to a target item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

/// Legacy row wrapped by an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyRef {
    Folder(Id),
    Endpoint(Id),
}

fn legacy_ref(item: &CollectionItem) -> Result<LegacyRef> {
    match (item.kind, item.folder_id, item.endpoint_id) {
        (ItemKind::Folder, Some(folder_id), None) => Ok(LegacyRef::Folder(folder_id)),
        (ItemKind::Endpoint, None, Some(endpoint_id)) => Ok(LegacyRef::Endpoint(endpoint_id)),
        _ => Err(StorageError::Corrupted(format!(
            "collection item {} has inconsistent kind columns",
            item.id
        ))),
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Vec<u8>,
    collection_id: Vec<u8>,
    parent_folder_id: Option<Vec<u8>>,
    item_type: i64,
    folder_id: Option<Vec<u8>>,
    endpoint_id: Option<Vec<u8>>,
    name: String,
    prev_id: Option<Vec<u8>>,
    next_id: Option<Vec<u8>>,
}

impl TryFrom<ItemRow> for CollectionItem {
    type Error = StorageError;

    fn try_from(row: ItemRow) -> Result<Self> {
        Ok(CollectionItem {
            id: decode_id("collection_items.id", &row.id)?,
            collection_id: decode_id("collection_items.collection_id", &row.collection_id)?,
            parent_folder_id: decode_opt_id(
                "collection_items.parent_folder_id",
                row.parent_folder_id.as_deref(),
            )?,
            kind: kind_from_i64(row.item_type)?,
            folder_id: decode_opt_id("collection_items.folder_id", row.folder_id.as_deref())?,
            endpoint_id: decode_opt_id("collection_items.endpoint_id", row.endpoint_id.as_deref())?,
            name: row.name,
            prev_id: decode_opt_id("collection_items.prev_id", row.prev_id.as_deref())?,
            next_id: decode_opt_id("collection_items.next_id", row.next_id.as_deref())?,
        })
    }
}

const SELECT: &str = "SELECT id, collection_id, parent_folder_id, item_type, folder_id, endpoint_id, name, prev_id, next_id FROM collection_items";

// ===== Lookups =====

pub async fn find(conn: &mut SqliteConnection, id: Id) -> Result<Option<CollectionItem>> {
    let row: Option<ItemRow> = sqlx::query_as(&format!("{SELECT} WHERE id = ?"))
        .bind(id.to_vec())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(CollectionItem::try_from).transpose()
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<CollectionItem> {
    find(conn, id)
        .await?
        .ok_or_else(|| StorageError::not_found("collection item", id))
}

pub async fn find_by_legacy_id(
    conn: &mut SqliteConnection,
    legacy_id: Id,
) -> Result<Option<CollectionItem>> {
    let row: Option<ItemRow> =
        sqlx::query_as(&format!("{SELECT} WHERE folder_id = ? OR endpoint_id = ?"))
            .bind(legacy_id.to_vec())
            .bind(legacy_id.to_vec())
            .fetch_optional(&mut *conn)
            .await?;
    row.map(CollectionItem::try_from).transpose()
}

/// Item wrapping the given legacy folder or endpoint.
pub async fn get_by_legacy_id(conn: &mut SqliteConnection, legacy_id: Id) -> Result<CollectionItem> {
    find_by_legacy_id(conn, legacy_id)
        .await?
        .ok_or_else(|| StorageError::not_found("collection item for legacy id", legacy_id))
}

/// Look up by collection item id, falling back to legacy folder/endpoint id.
pub async fn resolve(conn: &mut SqliteConnection, id: Id) -> Result<CollectionItem> {
    if let Some(item) = find(conn, id).await? {
        return Ok(item);
    }
    match find_by_legacy_id(conn, id).await? {
        Some(item) => {
            tracing::debug!("[CollectionItems] Resolved legacy id {} to item {}", id, item.id);
            Ok(item)
        }
        None => Err(StorageError::not_found("collection item", id)),
    }
}

async fn scope_rows(conn: &mut SqliteConnection, scope: Scope) -> Result<Vec<CollectionItem>> {
    let rows: Vec<ItemRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE collection_id = ? AND parent_folder_id IS ?"
    ))
    .bind(scope.collection_id.to_vec())
    .bind(opt_bytes(scope.parent_folder_id))
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(CollectionItem::try_from).collect()
}

/// Children of a folder item regardless of the collection column, ordered.
async fn children_in_order(
    conn: &mut SqliteConnection,
    folder_item_id: Id,
) -> Result<Vec<CollectionItem>> {
    let rows: Vec<ItemRow> = sqlx::query_as(&format!("{SELECT} WHERE parent_folder_id = ?"))
        .bind(folder_item_id.to_vec())
        .fetch_all(&mut *conn)
        .await?;
    let rows = rows
        .into_iter()
        .map(CollectionItem::try_from)
        .collect::<Result<Vec<_>>>()?;
    order_scope(rows)
}

/// Arrange the rows of one scope by walking `next_id` from the unique head.
///
/// Each row is consumed once, so the walk is O(n) and terminates even on a
/// cyclic chain. Any deviation from a single symmetric list is `Corrupted`.
pub fn order_scope(rows: Vec<CollectionItem>) -> Result<Vec<CollectionItem>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let total = rows.len();

    let mut heads = rows.iter().filter(|r| r.prev_id.is_none()).map(|r| r.id);
    let head = heads
        .next()
        .ok_or_else(|| StorageError::Corrupted("scope has no head".to_string()))?;
    if heads.next().is_some() {
        return Err(StorageError::Corrupted(
            "scope has more than one head".to_string(),
        ));
    }

    let mut by_id: HashMap<Id, CollectionItem> = rows.into_iter().map(|r| (r.id, r)).collect();
    let mut ordered = Vec::with_capacity(total);
    let mut expected_prev: Option<Id> = None;
    let mut cursor = Some(head);

    while let Some(id) = cursor {
        let item = by_id.remove(&id).ok_or_else(|| {
            StorageError::Corrupted(format!("next pointer to {id} leaves the scope or loops"))
        })?;
        if item.prev_id != expected_prev {
            return Err(StorageError::Corrupted(format!(
                "asymmetric link at {id}: prev is {:?}, expected {:?}",
                item.prev_id, expected_prev
            )));
        }
        expected_prev = Some(id);
        cursor = item.next_id;
        ordered.push(item);
    }

    if !by_id.is_empty() {
        return Err(StorageError::Corrupted(format!(
            "{} of {} rows unreachable from the scope head",
            by_id.len(),
            total
        )));
    }
    Ok(ordered)
}

/// Items of one scope in list order. Empty scopes yield an empty vec.
pub async fn list_in_order(conn: &mut SqliteConnection, scope: Scope) -> Result<Vec<CollectionItem>> {
    let rows = scope_rows(conn, scope).await?;
    order_scope(rows)
}

/// Every item of a collection, breadth-first, each scope in list order.
pub async fn list_tree(conn: &mut SqliteConnection, collection_id: Id) -> Result<Vec<CollectionItem>> {
    let mut items = list_in_order(conn, Scope::root(collection_id)).await?;
    let mut index = 0;
    while index < items.len() {
        if items[index].is_folder() {
            let children = list_in_order(conn, Scope::folder(collection_id, items[index].id)).await?;
            items.extend(children);
        }
        index += 1;
    }
    Ok(items)
}

/// All descendants of a folder item, breadth-first.
pub async fn descendants(conn: &mut SqliteConnection, folder_item_id: Id) -> Result<Vec<CollectionItem>> {
    let mut out = Vec::new();
    let mut queue = VecDeque::from([folder_item_id]);
    while let Some(parent) = queue.pop_front() {
        for child in children_in_order(conn, parent).await? {
            if child.is_folder() {
                queue.push_back(child.id);
            }
            out.push(child);
        }
    }
    Ok(out)
}

/// Whether `candidate` is `folder_item_id` itself or sits below it.
pub async fn is_within(conn: &mut SqliteConnection, candidate: Id, folder_item_id: Id) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut cursor = Some(candidate);
    while let Some(id) = cursor {
        if id == folder_item_id {
            return Ok(true);
        }
        if !seen.insert(id) {
            return Err(StorageError::Corrupted(format!("parent chain of {candidate} loops")));
        }
        cursor = get(conn, id).await?.parent_folder_id;
    }
    Ok(false)
}

// ===== Pointer primitives =====

async fn set_next(conn: &mut SqliteConnection, id: Id, next: Option<Id>) -> Result<()> {
    sqlx::query("UPDATE collection_items SET next_id = ? WHERE id = ?")
        .bind(opt_bytes(next))
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn set_prev(conn: &mut SqliteConnection, id: Id, prev: Option<Id>) -> Result<()> {
    sqlx::query("UPDATE collection_items SET prev_id = ? WHERE id = ?")
        .bind(opt_bytes(prev))
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn set_links(
    conn: &mut SqliteConnection,
    id: Id,
    prev: Option<Id>,
    next: Option<Id>,
) -> Result<()> {
    sqlx::query("UPDATE collection_items SET prev_id = ?, next_id = ? WHERE id = ?")
        .bind(opt_bytes(prev))
        .bind(opt_bytes(next))
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Tail of a scope, ignoring `exclude` (a row that is detached but already
/// carries the scope's columns).
async fn tail(conn: &mut SqliteConnection, scope: Scope, exclude: Id) -> Result<Option<CollectionItem>> {
    let rows: Vec<ItemRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE collection_id = ? AND parent_folder_id IS ? AND next_id IS NULL AND id != ?"
    ))
    .bind(scope.collection_id.to_vec())
    .bind(opt_bytes(scope.parent_folder_id))
    .bind(exclude.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    if rows.len() > 1 {
        return Err(StorageError::Corrupted(format!("scope {scope} has {} tails", rows.len())));
    }
    rows.into_iter().next().map(CollectionItem::try_from).transpose()
}

async fn link_at_tail(conn: &mut SqliteConnection, id: Id, scope: Scope) -> Result<Option<Id>> {
    let tail_id = tail(conn, scope, id).await?.map(|t| t.id);
    set_links(conn, id, tail_id, None).await?;
    if let Some(tail_id) = tail_id {
        set_next(conn, tail_id, Some(id)).await?;
    }
    Ok(tail_id)
}

/// Check that a scope's parent is a folder item of the same collection.
async fn validate_parent(conn: &mut SqliteConnection, scope: Scope) -> Result<Option<CollectionItem>> {
    let Some(parent_id) = scope.parent_folder_id else {
        return Ok(None);
    };
    let parent = find(conn, parent_id).await?.ok_or_else(|| {
        StorageError::InvalidArgument(format!("parent folder {parent_id} does not exist"))
    })?;
    if !parent.is_folder() {
        return Err(StorageError::InvalidArgument(format!(
            "parent {parent_id} is not a folder"
        )));
    }
    if parent.collection_id != scope.collection_id {
        return Err(StorageError::InvalidArgument(format!(
            "parent folder {parent_id} belongs to a different collection"
        )));
    }
    Ok(Some(parent))
}

// ===== Mutations =====

/// Insert a new item at the tail of `scope` wrapping an existing legacy row.
///
/// The legacy row must already carry the scope's collection and the legacy
/// id of the parent folder; it is normally created in the same transaction.
pub async fn append_to_scope(
    conn: &mut SqliteConnection,
    scope: Scope,
    kind: ItemKind,
    legacy_id: Id,
    name: &str,
) -> Result<CollectionItem> {
    let item_type = kind_to_i64(kind)?;
    let parent = validate_parent(conn, scope).await?;
    let legacy_parent = parent.and_then(|p| p.folder_id);

    let (legacy_collection, legacy_folder) = match kind {
        ItemKind::Folder => {
            let folder = folders::get(conn, legacy_id).await.map_err(missing_legacy)?;
            (folder.collection_id, folder.parent_id)
        }
        ItemKind::Endpoint => {
            let endpoint = endpoints::get(conn, legacy_id).await.map_err(missing_legacy)?;
            (endpoint.collection_id, endpoint.folder_id)
        }
        ItemKind::Unspecified => {
            return Err(StorageError::InvalidArgument(
                "item kind must be specified".to_string(),
            ));
        }
    };
    if legacy_collection != scope.collection_id || legacy_folder != legacy_parent {
        return Err(StorageError::InvalidArgument(format!(
            "legacy row {legacy_id} does not match scope {scope}"
        )));
    }

    let id = Id::new_now();
    let tail_id = tail(conn, scope, id).await?.map(|t| t.id);
    let (folder_id, endpoint_id) = match kind {
        ItemKind::Folder => (Some(legacy_id), None),
        _ => (None, Some(legacy_id)),
    };

    sqlx::query(
        "INSERT INTO collection_items
            (id, collection_id, parent_folder_id, item_type, folder_id, endpoint_id, name, prev_id, next_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL)",
    )
    .bind(id.to_vec())
    .bind(scope.collection_id.to_vec())
    .bind(opt_bytes(scope.parent_folder_id))
    .bind(item_type)
    .bind(opt_bytes(folder_id))
    .bind(opt_bytes(endpoint_id))
    .bind(name)
    .bind(opt_bytes(tail_id))
    .execute(&mut *conn)
    .await?;

    if let Some(tail_id) = tail_id {
        set_next(conn, tail_id, Some(id)).await?;
    }

    tracing::debug!(
        "[CollectionItems] Appended {:?} {} to {} after {:?}",
        kind,
        id,
        scope,
        tail_id
    );
    get(conn, id).await
}

fn missing_legacy(err: StorageError) -> StorageError {
    match err {
        StorageError::NotFound { entity, id } => {
            StorageError::InvalidArgument(format!("legacy {entity} {id} does not exist"))
        }
        other => other,
    }
}

/// Detach an item from its scope's list. Idempotent.
///
/// The row keeps its scope columns; only the pointers are cleared.
pub async fn unlink(conn: &mut SqliteConnection, id: Id) -> Result<CollectionItem> {
    let item = get(conn, id).await?;
    if item.prev_id.is_none() && item.next_id.is_none() {
        return Ok(item);
    }
    if let Some(prev) = item.prev_id {
        set_next(conn, prev, item.next_id).await?;
    }
    if let Some(next) = item.next_id {
        set_prev(conn, next, item.prev_id).await?;
    }
    set_links(conn, id, None, None).await?;
    tracing::debug!(
        "[CollectionItems] Unlinked {} (prev={:?}, next={:?})",
        id,
        item.prev_id,
        item.next_id
    );
    Ok(CollectionItem {
        prev_id: None,
        next_id: None,
        ..item
    })
}

pub async fn insert_before(conn: &mut SqliteConnection, moving_id: Id, target_id: Id) -> Result<()> {
    insert_relative(conn, moving_id, target_id, Placement::Before).await
}

pub async fn insert_after(conn: &mut SqliteConnection, moving_id: Id, target_id: Id) -> Result<()> {
    insert_relative(conn, moving_id, target_id, Placement::After).await
}

/// Place `moving_id` next to `target_id`. Both must share a scope; the moving
/// row is unlinked first, so it may be detached or linked anywhere in it.
pub async fn insert_relative(
    conn: &mut SqliteConnection,
    moving_id: Id,
    target_id: Id,
    placement: Placement,
) -> Result<()> {
    if moving_id == target_id {
        return Err(StorageError::InvalidArgument(
            "cannot move item relative to itself".to_string(),
        ));
    }
    let moving = get(conn, moving_id).await?;
    let target = get(conn, target_id).await?;
    if Scope::of(&moving) != Scope::of(&target) {
        return Err(StorageError::InvalidArgument(format!(
            "item {moving_id} and target {target_id} are in different scopes"
        )));
    }

    unlink(conn, moving_id).await?;
    // pointers of the target may have changed if it neighboured the moving row
    let target = get(conn, target_id).await?;

    match placement {
        Placement::Before => {
            set_links(conn, moving_id, target.prev_id, Some(target_id)).await?;
            if let Some(prev) = target.prev_id {
                set_next(conn, prev, Some(moving_id)).await?;
            }
            set_prev(conn, target_id, Some(moving_id)).await?;
        }
        Placement::After => {
            set_links(conn, moving_id, Some(target_id), target.next_id).await?;
            if let Some(next) = target.next_id {
                set_prev(conn, next, Some(moving_id)).await?;
            }
            set_next(conn, target_id, Some(moving_id)).await?;
        }
    }

    tracing::debug!(
        "[CollectionItems] Placed {} {:?} {}",
        moving_id,
        placement,
        target_id
    );
    Ok(())
}

/// Rewrite the legacy row of `item` to live in `collection_id` under the
/// legacy folder `legacy_parent`. Endpoints carry their examples along.
async fn relocate_legacy(
    conn: &mut SqliteConnection,
    item: &CollectionItem,
    collection_id: Id,
    legacy_parent: Option<Id>,
) -> Result<()> {
    match legacy_ref(item)? {
        LegacyRef::Folder(folder_id) => {
            folders::set_location(conn, folder_id, collection_id, legacy_parent).await
        }
        LegacyRef::Endpoint(endpoint_id) => {
            endpoints::set_location(conn, endpoint_id, collection_id, legacy_parent).await?;
            examples::set_collection_for_endpoint(conn, endpoint_id, collection_id).await?;
            Ok(())
        }
    }
}

/// Move every descendant of a folder item into `collection_id`.
///
/// Breadth-first; each sibling group moves as a whole, so its pointers stay
/// valid and its relative order is kept.
async fn reparent_descendants(
    conn: &mut SqliteConnection,
    folder_item: &CollectionItem,
    collection_id: Id,
) -> Result<usize> {
    let mut moved = 0;
    let mut queue = VecDeque::from([(folder_item.id, folder_item.folder_id)]);
    while let Some((parent_item, parent_legacy)) = queue.pop_front() {
        for child in children_in_order(conn, parent_item).await? {
            sqlx::query("UPDATE collection_items SET collection_id = ? WHERE id = ?")
                .bind(collection_id.to_vec())
                .bind(child.id.to_vec())
                .execute(&mut *conn)
                .await?;
            relocate_legacy(conn, &child, collection_id, parent_legacy).await?;
            if child.is_folder() {
                queue.push_back((child.id, child.folder_id));
            }
            moved += 1;
        }
    }
    Ok(moved)
}

/// Detach an item and append it to the tail of `dest`, keeping the legacy
/// row in lockstep. Folder moves across collections take the whole subtree.
pub async fn move_to_scope(conn: &mut SqliteConnection, id: Id, dest: Scope) -> Result<CollectionItem> {
    let item = get(conn, id).await?;
    let parent = validate_parent(conn, dest).await?;

    if item.is_folder() {
        if let Some(parent_id) = dest.parent_folder_id {
            if is_within(conn, parent_id, id).await? {
                return Err(StorageError::InvalidArgument(
                    "cannot move a folder into itself or one of its descendants".to_string(),
                ));
            }
        }
    }

    let source = Scope::of(&item);
    unlink(conn, id).await?;

    sqlx::query("UPDATE collection_items SET collection_id = ?, parent_folder_id = ? WHERE id = ?")
        .bind(dest.collection_id.to_vec())
        .bind(opt_bytes(dest.parent_folder_id))
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;

    let legacy_parent = parent.and_then(|p| p.folder_id);
    relocate_legacy(conn, &item, dest.collection_id, legacy_parent).await?;

    if item.is_folder() && source.collection_id != dest.collection_id {
        let moved = reparent_descendants(conn, &item, dest.collection_id).await?;
        tracing::debug!(
            "[CollectionItems] Re-parented {} descendants of {} into {}",
            moved,
            id,
            dest.collection_id
        );
    }

    link_at_tail(conn, id, dest).await?;
    tracing::debug!("[CollectionItems] Moved {} from {} to {}", id, source, dest);
    get(conn, id).await
}

/// Delete an item. Folders take every descendant item and legacy row along.
///
/// Returns the removed items, the requested one first.
pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<Vec<CollectionItem>> {
    let item = unlink(conn, id).await?;
    let mut removed = vec![item];
    if removed[0].is_folder() {
        removed.extend(descendants(conn, id).await?);
    }

    // leaves first, so no cascade has to fire
    for doomed in removed.iter().rev() {
        sqlx::query("DELETE FROM collection_items WHERE id = ?")
            .bind(doomed.id.to_vec())
            .execute(&mut *conn)
            .await?;
    }
    for doomed in removed.iter().rev() {
        match legacy_ref(doomed)? {
            LegacyRef::Folder(folder_id) => folders::delete(conn, folder_id).await?,
            LegacyRef::Endpoint(endpoint_id) => endpoints::delete(conn, endpoint_id).await?,
        }
    }

    tracing::debug!(
        "[CollectionItems] Deleted {} ({} rows including descendants)",
        id,
        removed.len()
    );
    Ok(removed)
}

/// Keep the item's display name in lockstep with its renamed legacy row.
pub async fn rename_by_legacy_id(
    conn: &mut SqliteConnection,
    legacy_id: Id,
    name: &str,
) -> Result<CollectionItem> {
    let item = get_by_legacy_id(conn, legacy_id).await?;
    sqlx::query("UPDATE collection_items SET name = ? WHERE id = ?")
        .bind(name)
        .bind(item.id.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(CollectionItem {
        name: name.to_string(),
        ..item
    })
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct CollectionItemStore {
    pool: SqlitePool,
}

impl CollectionItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<CollectionItem> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn get_by_legacy_id(&self, legacy_id: Id) -> Result<CollectionItem> {
        let mut conn = self.pool.acquire().await?;
        get_by_legacy_id(&mut conn, legacy_id).await
    }

    pub async fn resolve(&self, id: Id) -> Result<CollectionItem> {
        let mut conn = self.pool.acquire().await?;
        resolve(&mut conn, id).await
    }

    pub async fn list_in_order(&self, scope: Scope) -> Result<Vec<CollectionItem>> {
        let mut conn = self.pool.acquire().await?;
        list_in_order(&mut conn, scope).await
    }

    pub async fn list_tree(&self, collection_id: Id) -> Result<Vec<CollectionItem>> {
        let mut conn = self.pool.acquire().await?;
        list_tree(&mut conn, collection_id).await
    }

    pub async fn descendants(&self, folder_item_id: Id) -> Result<Vec<CollectionItem>> {
        let mut conn = self.pool.acquire().await?;
        descendants(&mut conn, folder_item_id).await
    }
}

/// Transaction-bound writer. All pointer updates of one call run on the
/// transaction's connection and become visible together at commit.
pub struct CollectionItemWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> CollectionItemWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self::on(tx.conn()?))
    }

    /// Writer over a connection that already runs inside a transaction.
    pub fn on(conn: &'t mut SqliteConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&mut self, id: Id) -> Result<CollectionItem> {
        get(self.conn, id).await
    }

    pub async fn get_by_legacy_id(&mut self, legacy_id: Id) -> Result<CollectionItem> {
        get_by_legacy_id(self.conn, legacy_id).await
    }

    pub async fn resolve(&mut self, id: Id) -> Result<CollectionItem> {
        resolve(self.conn, id).await
    }

    pub async fn list_in_order(&mut self, scope: Scope) -> Result<Vec<CollectionItem>> {
        list_in_order(self.conn, scope).await
    }

    pub async fn append_to_scope(
        &mut self,
        scope: Scope,
        kind: ItemKind,
        legacy_id: Id,
        name: &str,
    ) -> Result<CollectionItem> {
        append_to_scope(self.conn, scope, kind, legacy_id, name).await
    }

    pub async fn unlink(&mut self, id: Id) -> Result<CollectionItem> {
        unlink(self.conn, id).await
    }

    pub async fn insert_before(&mut self, moving_id: Id, target_id: Id) -> Result<()> {
        insert_before(self.conn, moving_id, target_id).await
    }

    pub async fn insert_after(&mut self, moving_id: Id, target_id: Id) -> Result<()> {
        insert_after(self.conn, moving_id, target_id).await
    }

    pub async fn insert_relative(&mut self, moving_id: Id, target_id: Id, placement: Placement) -> Result<()> {
        insert_relative(self.conn, moving_id, target_id, placement).await
    }

    pub async fn move_to_scope(&mut self, id: Id, dest: Scope) -> Result<CollectionItem> {
        move_to_scope(self.conn, id, dest).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<Vec<CollectionItem>> {
        delete(self.conn, id).await
    }

    pub async fn rename_by_legacy_id(&mut self, legacy_id: Id, name: &str) -> Result<CollectionItem> {
        rename_by_legacy_id(self.conn, legacy_id, name).await
    }
}
