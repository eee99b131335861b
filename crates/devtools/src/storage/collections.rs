use devtools_api::{Collection, Id};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id};

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: Vec<u8>,
    workspace_id: Vec<u8>,
    name: String,
    updated_at: i64,
}

impl TryFrom<CollectionRow> for Collection {
    type Error = StorageError;

    fn try_from(row: CollectionRow) -> Result<Self> {
        Ok(Collection {
            id: decode_id("collections.id", &row.id)?,
            workspace_id: decode_id("collections.workspace_id", &row.workspace_id)?,
            name: row.name,
            updated_at: row.updated_at,
        })
    }
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Collection> {
    let row: Option<CollectionRow> =
        sqlx::query_as("SELECT id, workspace_id, name, updated_at FROM collections WHERE id = ?")
            .bind(id.to_vec())
            .fetch_optional(&mut *conn)
            .await?;
    row.ok_or_else(|| StorageError::not_found("collection", id))?
        .try_into()
}

pub async fn list(conn: &mut SqliteConnection, workspace_id: Id) -> Result<Vec<Collection>> {
    let rows: Vec<CollectionRow> = sqlx::query_as(
        "SELECT id, workspace_id, name, updated_at FROM collections
         WHERE workspace_id = ? ORDER BY id",
    )
    .bind(workspace_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Collection::try_from).collect()
}

/// Workspace owning the collection.
pub async fn workspace_id(conn: &mut SqliteConnection, collection_id: Id) -> Result<Id> {
    let row: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT workspace_id FROM collections WHERE id = ?")
            .bind(collection_id.to_vec())
            .fetch_optional(&mut *conn)
            .await?;
    match row {
        Some(bytes) => decode_id("collections.workspace_id", &bytes),
        None => Err(StorageError::not_found("collection", collection_id)),
    }
}

pub async fn create(conn: &mut SqliteConnection, collection: &Collection) -> Result<()> {
    sqlx::query("INSERT INTO collections (id, workspace_id, name, updated_at) VALUES (?, ?, ?, ?)")
        .bind(collection.id.to_vec())
        .bind(collection.workspace_id.to_vec())
        .bind(&collection.name)
        .bind(collection.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, collection: &Collection) -> Result<()> {
    let result = sqlx::query("UPDATE collections SET name = ?, updated_at = ? WHERE id = ?")
        .bind(&collection.name)
        .bind(collection.updated_at)
        .bind(collection.id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("collection", collection.id));
    }
    Ok(())
}

/// Delete a collection. Its items, folders, endpoints and examples cascade.
pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM collections WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("collection", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    pool: SqlitePool,
}

impl CollectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<Collection> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list(&self, workspace_id: Id) -> Result<Vec<Collection>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn, workspace_id).await
    }

    pub async fn workspace_id(&self, collection_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await?;
        workspace_id(&mut conn, collection_id).await
    }
}

/// Transaction-bound writer.
pub struct CollectionWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> CollectionWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<Collection> {
        get(self.conn, id).await
    }

    pub async fn create(&mut self, collection: &Collection) -> Result<()> {
        create(self.conn, collection).await
    }

    pub async fn update(&mut self, collection: &Collection) -> Result<()> {
        update(self.conn, collection).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}
