use devtools_api::messages::MovePosition;
use devtools_api::{CollectionItem, Id, ItemKind};
use sqlx::SqliteConnection;
use thiserror::Error;

use crate::collection_items::store::{self, CollectionItemWriter, Placement, Scope};
use crate::permission::{self, PermissionError};
use crate::storage::{Database, StorageError, collections};

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for MoveError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, .. } => MoveError::NotFound(entity),
            StorageError::InvalidArgument(message) => MoveError::InvalidArgument(message),
            other => MoveError::Storage(other),
        }
    }
}

impl From<PermissionError> for MoveError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::NotFound(entity) => MoveError::NotFound(entity),
            PermissionError::Denied(message) => MoveError::PermissionDenied(message),
            PermissionError::Storage(inner) => MoveError::Storage(inner),
        }
    }
}

pub type Result<T> = std::result::Result<T, MoveError>;

/// Decoded move request. Every id may be a collection item id or the legacy
/// folder/endpoint id it wraps.
#[derive(Debug, Clone, Default)]
pub struct MoveRequest {
    pub item_id: Id,
    pub collection_id: Id,
    pub target_collection_id: Option<Id>,
    pub target_parent_folder_id: Option<Id>,
    pub target_item_id: Option<Id>,
    pub position: MovePosition,
    pub kind: ItemKind,
    pub target_kind: Option<ItemKind>,
}

/// What a committed move changed.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Post-state of the moved item
    pub item: CollectionItem,
    /// Scope the item was taken out of
    pub from: Scope,
    /// Workspace of both the source and the destination
    pub workspace_id: Id,
}

impl MoveOutcome {
    pub fn to(&self) -> Scope {
        Scope::of(&self.item)
    }

    pub fn crossed_collections(&self) -> bool {
        self.from.collection_id != self.item.collection_id
    }
}

/// Validated plan, produced before any write.
#[derive(Debug)]
struct MovePlan {
    item: CollectionItem,
    dest: Scope,
    anchor: Option<(Id, Placement)>,
    workspace_id: Id,
}

/// Runs moves in their own write transaction.
#[derive(Debug, Clone)]
pub struct MoveEngine {
    db: Database,
}

impl MoveEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validate and execute one move. Nothing is written unless every check
    /// passes, and a failure after the first write rolls back all of it.
    pub async fn execute(&self, user_id: Id, request: &MoveRequest) -> Result<MoveOutcome> {
        let mut tx = self.db.begin_write().await?;
        let outcome = move_item(tx.conn()?, user_id, request).await?;
        tx.commit().await?;
        tracing::info!(
            "[MoveEngine] Moved {} from {} to {}",
            outcome.item.id,
            outcome.from,
            outcome.to()
        );
        Ok(outcome)
    }
}

/// Validate and execute a move on an open transaction.
pub async fn move_item(
    conn: &mut SqliteConnection,
    user_id: Id,
    request: &MoveRequest,
) -> Result<MoveOutcome> {
    let plan = build_plan(conn, user_id, request).await?;
    let from = Scope::of(&plan.item);
    let item_id = plan.item.id;

    let mut items = CollectionItemWriter::on(conn);
    match plan.anchor {
        Some((target_id, placement)) => {
            if plan.dest != from {
                items.move_to_scope(item_id, plan.dest).await?;
            }
            items.insert_relative(item_id, target_id, placement).await?;
        }
        None => {
            items.move_to_scope(item_id, plan.dest).await?;
        }
    }

    let item = items.get(item_id).await?;
    Ok(MoveOutcome {
        item,
        from,
        workspace_id: plan.workspace_id,
    })
}

async fn build_plan(conn: &mut SqliteConnection, user_id: Id, request: &MoveRequest) -> Result<MovePlan> {
    // source collection: the caller named it, so denial may be explicit
    let workspace_id = collections::workspace_id(conn, request.collection_id)
        .await
        .map_err(|err| match err {
            StorageError::NotFound { .. } => MoveError::NotFound("collection".to_string()),
            other => other.into(),
        })?;
    if !permission::belongs_to_workspace(conn, user_id, workspace_id).await? {
        return Err(MoveError::PermissionDenied(
            "caller is not a member of the source workspace".to_string(),
        ));
    }

    if let Some(target_collection_id) = request.target_collection_id {
        if target_collection_id != request.collection_id {
            permission::check_collection(conn, user_id, target_collection_id)
                .await
                .map_err(|err| match err {
                    PermissionError::Storage(inner) => MoveError::Storage(inner),
                    _ => MoveError::NotFound("target collection".to_string()),
                })?;
        }
    }

    if request.target_item_id == Some(request.item_id) {
        return Err(self_reference());
    }

    if request.kind == ItemKind::Unspecified {
        return Err(MoveError::InvalidArgument(
            "source kind must be specified".to_string(),
        ));
    }

    let item = store::resolve(conn, request.item_id).await?;
    if item.collection_id != request.collection_id {
        tracing::debug!(
            "[MoveEngine] Item {} lives in {}, not in requested collection {}",
            item.id,
            item.collection_id,
            request.collection_id
        );
        return Err(MoveError::NotFound("collection item".to_string()));
    }
    if item.kind != request.kind {
        tracing::warn!(
            "[MoveEngine] Source kind {:?} does not match stored kind {:?} of {}",
            request.kind,
            item.kind,
            item.id
        );
    }

    let target = match request.target_item_id {
        Some(id) => Some(
            store::resolve(conn, id)
                .await
                .map_err(|err| not_found_as(err, "target item"))?,
        ),
        None => None,
    };
    if target.as_ref().is_some_and(|t| t.id == item.id) {
        return Err(self_reference());
    }

    let target_parent = match request.target_parent_folder_id {
        Some(id) => {
            let parent = store::resolve(conn, id)
                .await
                .map_err(|err| not_found_as(err, "target parent folder"))?;
            if !parent.is_folder() {
                return Err(MoveError::InvalidArgument(format!(
                    "target parent {} is not a folder",
                    parent.id
                )));
            }
            Some(parent)
        }
        None => None,
    };

    // every collection the destination touches must sit in the source workspace
    let mut touched = Vec::new();
    if let Some(t) = &target {
        touched.push(t.collection_id);
    }
    if let Some(p) = &target_parent {
        touched.push(p.collection_id);
    }
    if let Some(c) = request.target_collection_id {
        touched.push(c);
    }
    for collection_id in touched {
        if collection_id == item.collection_id {
            continue;
        }
        let other = collections::workspace_id(conn, collection_id)
            .await
            .map_err(|err| not_found_as(err, "target collection"))?;
        if other != workspace_id {
            return Err(
                if permission::belongs_to_workspace(conn, user_id, other).await? {
                    tracing::debug!(
                        "[MoveEngine] Rejected move of {} from workspace {} into {}",
                        item.id,
                        workspace_id,
                        other
                    );
                    MoveError::PermissionDenied("cannot move items across workspaces".to_string())
                } else {
                    MoveError::NotFound("target collection".to_string())
                },
            );
        }
    }

    if let (Some(t), Some(expected)) = (&target, request.target_kind) {
        if expected != ItemKind::Unspecified && expected != t.kind {
            tracing::warn!(
                "[MoveEngine] Target kind hint {:?} does not match stored kind {:?} of {}; ignoring",
                expected,
                t.kind,
                t.id
            );
        }
    }

    let anchor = match (&target, request.position) {
        (Some(_), MovePosition::Unspecified) => {
            return Err(MoveError::InvalidArgument(
                "position must be BEFORE or AFTER when a target item is given".to_string(),
            ));
        }
        (Some(t), MovePosition::Before) => Some((t.id, Placement::Before)),
        (Some(t), MovePosition::After) => Some((t.id, Placement::After)),
        (None, _) => None,
    };

    let dest = match &target {
        Some(t) => {
            let dest = Scope::of(t);
            if let Some(collection_id) = request.target_collection_id {
                if collection_id != dest.collection_id {
                    return Err(MoveError::InvalidArgument(format!(
                        "target item {} is not in collection {}",
                        t.id, collection_id
                    )));
                }
            }
            if let Some(parent) = &target_parent {
                if dest.parent_folder_id != Some(parent.id) {
                    return Err(MoveError::InvalidArgument(format!(
                        "target item {} is not a child of folder {}",
                        t.id, parent.id
                    )));
                }
            }
            dest
        }
        None => {
            let collection_id = request
                .target_collection_id
                .or(target_parent.as_ref().map(|p| p.collection_id))
                .unwrap_or(item.collection_id);
            let parent_folder_id = match &target_parent {
                Some(parent) => {
                    if parent.collection_id != collection_id {
                        return Err(MoveError::InvalidArgument(format!(
                            "target parent {} is not in collection {}",
                            parent.id, collection_id
                        )));
                    }
                    Some(parent.id)
                }
                // a new collection without an explicit parent lands at its root
                None if collection_id != item.collection_id => None,
                None => item.parent_folder_id,
            };
            Scope {
                collection_id,
                parent_folder_id,
            }
        }
    };

    Ok(MovePlan {
        item,
        dest,
        anchor,
        workspace_id,
    })
}

fn self_reference() -> MoveError {
    MoveError::InvalidArgument("cannot move item relative to itself".to_string())
}

fn not_found_as(err: StorageError, entity: &str) -> MoveError {
    match err {
        StorageError::NotFound { .. } => MoveError::NotFound(entity.to_string()),
        other => other.into(),
    }
}
