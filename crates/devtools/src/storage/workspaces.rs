use devtools_api::{Id, Role, Workspace, WorkspaceMember};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id, now_millis};

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    id: Vec<u8>,
    name: String,
    updated_at: i64,
    collection_count: i64,
    flow_count: i64,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = StorageError;

    fn try_from(row: WorkspaceRow) -> Result<Self> {
        Ok(Workspace {
            id: decode_id("workspaces.id", &row.id)?,
            name: row.name,
            updated_at: row.updated_at,
            collection_count: row.collection_count,
            flow_count: row.flow_count,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Vec<u8>,
    workspace_id: Vec<u8>,
    user_id: Vec<u8>,
    role: i64,
}

impl TryFrom<MemberRow> for WorkspaceMember {
    type Error = StorageError;

    fn try_from(row: MemberRow) -> Result<Self> {
        let role = Role::from_i64(row.role)
            .ok_or_else(|| StorageError::Corrupted(format!("unknown role {}", row.role)))?;
        Ok(WorkspaceMember {
            id: decode_id("workspaces_users.id", &row.id)?,
            workspace_id: decode_id("workspaces_users.workspace_id", &row.workspace_id)?,
            user_id: decode_id("workspaces_users.user_id", &row.user_id)?,
            role,
        })
    }
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Workspace> {
    let row: Option<WorkspaceRow> = sqlx::query_as(
        "SELECT id, name, updated_at, collection_count, flow_count FROM workspaces WHERE id = ?",
    )
    .bind(id.to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    row.ok_or_else(|| StorageError::not_found("workspace", id))?
        .try_into()
}

/// Workspaces the user is a member of, newest first.
pub async fn list_by_user(conn: &mut SqliteConnection, user_id: Id) -> Result<Vec<Workspace>> {
    let rows: Vec<WorkspaceRow> = sqlx::query_as(
        "SELECT w.id, w.name, w.updated_at, w.collection_count, w.flow_count
         FROM workspaces w JOIN workspaces_users wu ON wu.workspace_id = w.id
         WHERE wu.user_id = ? ORDER BY w.updated_at DESC, w.id DESC",
    )
    .bind(user_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Workspace::try_from).collect()
}

/// Ids of every workspace the user is a member of.
pub async fn ids_by_user(conn: &mut SqliteConnection, user_id: Id) -> Result<Vec<Id>> {
    let rows: Vec<Vec<u8>> =
        sqlx::query_scalar("SELECT workspace_id FROM workspaces_users WHERE user_id = ?")
            .bind(user_id.to_vec())
            .fetch_all(&mut *conn)
            .await?;
    rows.iter()
        .map(|b| decode_id("workspaces_users.workspace_id", b))
        .collect()
}

pub async fn create(conn: &mut SqliteConnection, workspace: &Workspace) -> Result<()> {
    sqlx::query(
        "INSERT INTO workspaces (id, name, updated_at, collection_count, flow_count)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(workspace.id.to_vec())
    .bind(&workspace.name)
    .bind(workspace.updated_at)
    .bind(workspace.collection_count)
    .bind(workspace.flow_count)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, workspace: &Workspace) -> Result<()> {
    let result = sqlx::query(
        "UPDATE workspaces SET name = ?, updated_at = ?, collection_count = ?, flow_count = ?
         WHERE id = ?",
    )
    .bind(&workspace.name)
    .bind(workspace.updated_at)
    .bind(workspace.collection_count)
    .bind(workspace.flow_count)
    .bind(workspace.id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("workspace", workspace.id));
    }
    Ok(())
}

/// Delete a workspace; collections, environments and memberships cascade.
pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("workspace", id));
    }
    Ok(())
}

async fn adjust_collection_count(conn: &mut SqliteConnection, id: Id, delta: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE workspaces SET collection_count = MAX(collection_count + ?, 0), updated_at = ?
         WHERE id = ?",
    )
    .bind(delta)
    .bind(now_millis())
    .bind(id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("workspace", id));
    }
    Ok(())
}

pub async fn increment_collection_count(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    adjust_collection_count(conn, id, 1).await
}

pub async fn decrement_collection_count(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    adjust_collection_count(conn, id, -1).await
}

pub async fn add_member(conn: &mut SqliteConnection, member: &WorkspaceMember) -> Result<()> {
    sqlx::query("INSERT INTO workspaces_users (id, workspace_id, user_id, role) VALUES (?, ?, ?, ?)")
        .bind(member.id.to_vec())
        .bind(member.workspace_id.to_vec())
        .bind(member.user_id.to_vec())
        .bind(member.role.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Membership of `user_id` in `workspace_id`, if any.
pub async fn member(
    conn: &mut SqliteConnection,
    workspace_id: Id,
    user_id: Id,
) -> Result<Option<WorkspaceMember>> {
    let row: Option<MemberRow> = sqlx::query_as(
        "SELECT id, workspace_id, user_id, role FROM workspaces_users
         WHERE workspace_id = ? AND user_id = ?",
    )
    .bind(workspace_id.to_vec())
    .bind(user_id.to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    row.map(WorkspaceMember::try_from).transpose()
}

pub async fn list_members(
    conn: &mut SqliteConnection,
    workspace_id: Id,
) -> Result<Vec<WorkspaceMember>> {
    let rows: Vec<MemberRow> = sqlx::query_as(
        "SELECT id, workspace_id, user_id, role FROM workspaces_users
         WHERE workspace_id = ? ORDER BY id",
    )
    .bind(workspace_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(WorkspaceMember::try_from).collect()
}

pub async fn remove_member(conn: &mut SqliteConnection, workspace_id: Id, user_id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM workspaces_users WHERE workspace_id = ? AND user_id = ?")
        .bind(workspace_id.to_vec())
        .bind(user_id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("workspace member", user_id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    pool: SqlitePool,
}

impl WorkspaceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<Workspace> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list_by_user(&self, user_id: Id) -> Result<Vec<Workspace>> {
        let mut conn = self.pool.acquire().await?;
        list_by_user(&mut conn, user_id).await
    }

    pub async fn ids_by_user(&self, user_id: Id) -> Result<Vec<Id>> {
        let mut conn = self.pool.acquire().await?;
        ids_by_user(&mut conn, user_id).await
    }

    pub async fn member(&self, workspace_id: Id, user_id: Id) -> Result<Option<WorkspaceMember>> {
        let mut conn = self.pool.acquire().await?;
        member(&mut conn, workspace_id, user_id).await
    }

    pub async fn list_members(&self, workspace_id: Id) -> Result<Vec<WorkspaceMember>> {
        let mut conn = self.pool.acquire().await?;
        list_members(&mut conn, workspace_id).await
    }
}

/// Transaction-bound writer.
pub struct WorkspaceWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> WorkspaceWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<Workspace> {
        get(self.conn, id).await
    }

    pub async fn create(&mut self, workspace: &Workspace) -> Result<()> {
        create(self.conn, workspace).await
    }

    pub async fn update(&mut self, workspace: &Workspace) -> Result<()> {
        update(self.conn, workspace).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }

    pub async fn increment_collection_count(&mut self, id: Id) -> Result<()> {
        increment_collection_count(self.conn, id).await
    }

    pub async fn decrement_collection_count(&mut self, id: Id) -> Result<()> {
        decrement_collection_count(self.conn, id).await
    }

    pub async fn add_member(&mut self, member: &WorkspaceMember) -> Result<()> {
        add_member(self.conn, member).await
    }

    pub async fn member(&mut self, workspace_id: Id, user_id: Id) -> Result<Option<WorkspaceMember>> {
        member(self.conn, workspace_id, user_id).await
    }

    pub async fn list_members(&mut self, workspace_id: Id) -> Result<Vec<WorkspaceMember>> {
        list_members(self.conn, workspace_id).await
    }

    pub async fn remove_member(&mut self, workspace_id: Id, user_id: Id) -> Result<()> {
        remove_member(self.conn, workspace_id, user_id).await
    }
}
