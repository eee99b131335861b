//! Workspace membership checks.
//!
//! Every resource resolves to the workspace that owns it, then the caller's
//! membership in that workspace decides. A workspace the caller is not a
//! member of is reported exactly like a missing one, so existence never
//! leaks through this gate.

use devtools_api::{CollectionItem, Id, Role};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

use crate::collection_items::store as items;
use crate::storage::{
    StorageError, collections, endpoints, environments, examples, folders, workspaces,
};

#[derive(Debug, Error)]
pub enum PermissionError {
    /// Absent, or present in a workspace the caller cannot see
    #[error("{0} not found")]
    NotFound(String),

    /// Visible to the caller, but the action needs more privilege
    #[error("permission denied: {0}")]
    Denied(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for PermissionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, .. } => PermissionError::NotFound(entity),
            other => PermissionError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PermissionError>;

pub async fn belongs_to_workspace(
    conn: &mut SqliteConnection,
    user_id: Id,
    workspace_id: Id,
) -> std::result::Result<bool, StorageError> {
    Ok(workspaces::member(conn, workspace_id, user_id).await?.is_some())
}

pub async fn role(
    conn: &mut SqliteConnection,
    user_id: Id,
    workspace_id: Id,
) -> std::result::Result<Option<Role>, StorageError> {
    Ok(workspaces::member(conn, workspace_id, user_id)
        .await?
        .map(|m| m.role))
}

/// Caller must be a member; otherwise the workspace is reported missing.
pub async fn check_workspace(conn: &mut SqliteConnection, user_id: Id, workspace_id: Id) -> Result<()> {
    if belongs_to_workspace(conn, user_id, workspace_id).await? {
        Ok(())
    } else {
        tracing::debug!(
            "[PermissionGate] User {} is not a member of workspace {}",
            user_id,
            workspace_id
        );
        Err(PermissionError::NotFound("workspace".to_string()))
    }
}

/// Caller must hold at least `min`. Non-members see `NotFound`, members with
/// a lower role see `Denied`.
pub async fn require_role(
    conn: &mut SqliteConnection,
    user_id: Id,
    workspace_id: Id,
    min: Role,
) -> Result<Role> {
    match role(conn, user_id, workspace_id).await? {
        None => Err(PermissionError::NotFound("workspace".to_string())),
        Some(role) if role >= min => Ok(role),
        Some(role) => Err(PermissionError::Denied(format!(
            "role {role:?} is below required {min:?}"
        ))),
    }
}

/// Workspace of a visible collection.
pub async fn check_collection(
    conn: &mut SqliteConnection,
    user_id: Id,
    collection_id: Id,
) -> Result<Id> {
    let workspace_id = collections::workspace_id(conn, collection_id).await?;
    check_workspace(conn, user_id, workspace_id)
        .await
        .map_err(|_| PermissionError::NotFound("collection".to_string()))?;
    Ok(workspace_id)
}

/// Visible collection item, looked up by item id or legacy id, with its
/// workspace.
pub async fn check_collection_item(
    conn: &mut SqliteConnection,
    user_id: Id,
    id: Id,
) -> Result<(CollectionItem, Id)> {
    let item = items::resolve(conn, id).await?;
    let workspace_id = check_collection(conn, user_id, item.collection_id)
        .await
        .map_err(|_| PermissionError::NotFound("collection item".to_string()))?;
    Ok((item, workspace_id))
}

async fn check_owned(
    conn: &mut SqliteConnection,
    user_id: Id,
    entity: &str,
    workspace_id: std::result::Result<Id, StorageError>,
) -> Result<Id> {
    let workspace_id = workspace_id?;
    check_workspace(conn, user_id, workspace_id)
        .await
        .map_err(|_| PermissionError::NotFound(entity.to_string()))?;
    Ok(workspace_id)
}

pub async fn check_folder(conn: &mut SqliteConnection, user_id: Id, folder_id: Id) -> Result<Id> {
    let workspace_id = folders::workspace_id(conn, folder_id).await;
    check_owned(conn, user_id, "folder", workspace_id).await
}

pub async fn check_endpoint(conn: &mut SqliteConnection, user_id: Id, endpoint_id: Id) -> Result<Id> {
    let workspace_id = endpoints::workspace_id(conn, endpoint_id).await;
    check_owned(conn, user_id, "endpoint", workspace_id).await
}

pub async fn check_example(conn: &mut SqliteConnection, user_id: Id, example_id: Id) -> Result<Id> {
    let workspace_id = examples::workspace_id(conn, example_id).await;
    check_owned(conn, user_id, "example", workspace_id).await
}

pub async fn check_environment(
    conn: &mut SqliteConnection,
    user_id: Id,
    environment_id: Id,
) -> Result<Id> {
    let workspace_id = environments::workspace_id(conn, environment_id).await;
    check_owned(conn, user_id, "environment", workspace_id).await
}

/// Pool-bound gate for read-only handlers.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    pool: SqlitePool,
}

impl PermissionGate {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn check_workspace(&self, user_id: Id, workspace_id: Id) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        check_workspace(&mut conn, user_id, workspace_id).await
    }

    pub async fn check_collection(&self, user_id: Id, collection_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        check_collection(&mut conn, user_id, collection_id).await
    }

    pub async fn check_endpoint(&self, user_id: Id, endpoint_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        check_endpoint(&mut conn, user_id, endpoint_id).await
    }

    pub async fn check_example(&self, user_id: Id, example_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
        check_example(&mut conn, user_id, example_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_non_member_sees_not_found() {
        let fx = Fixture::new().await;
        let stranger = fx.add_user("stranger@example.com").await;
        let gate = PermissionGate::new(fx.db.pool().clone());

        gate.check_collection(fx.user_id, fx.collection_id).await.unwrap();
        assert!(matches!(
            gate.check_collection(stranger, fx.collection_id).await,
            Err(PermissionError::NotFound(_))
        ));
        assert!(matches!(
            gate.check_collection(fx.user_id, Id::new_now()).await,
            Err(PermissionError::NotFound(_))
        ));
        assert!(matches!(
            gate.check_workspace(stranger, fx.workspace_id).await,
            Err(PermissionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_item_lookup_accepts_legacy_ids() {
        let fx = Fixture::new().await;
        let endpoint = fx.add_endpoint(None, "E").await;
        let mut conn = fx.db.acquire().await.unwrap();

        let (item, workspace_id) = check_collection_item(&mut conn, fx.user_id, endpoint.endpoint_id)
            .await
            .unwrap();
        assert_eq!(item.id, endpoint.item_id);
        assert_eq!(workspace_id, fx.workspace_id);
        assert_eq!(
            check_endpoint(&mut conn, fx.user_id, endpoint.endpoint_id).await.unwrap(),
            fx.workspace_id
        );
        assert_eq!(
            check_example(&mut conn, fx.user_id, endpoint.default_example_id)
                .await
                .unwrap(),
            fx.workspace_id
        );
    }

    #[tokio::test]
    async fn test_role_ordering() {
        let fx = Fixture::new().await;
        let member = fx.add_user("member@example.com").await;
        fx.add_member(fx.workspace_id, member, Role::User).await;
        let mut conn = fx.db.acquire().await.unwrap();

        assert_eq!(
            require_role(&mut conn, fx.user_id, fx.workspace_id, Role::Owner)
                .await
                .unwrap(),
            Role::Owner
        );
        assert!(matches!(
            require_role(&mut conn, member, fx.workspace_id, Role::Admin).await,
            Err(PermissionError::Denied(_))
        ));
        assert!(matches!(
            require_role(&mut conn, Id::new_now(), fx.workspace_id, Role::User).await,
            Err(PermissionError::NotFound(_))
        ));
    }
}
