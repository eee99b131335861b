use devtools_api::{Folder, Id};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id, decode_opt_id, opt_bytes};

#[derive(sqlx::FromRow)]
struct FolderRow {
    id: Vec<u8>,
    collection_id: Vec<u8>,
    parent_id: Option<Vec<u8>>,
    name: String,
}

impl TryFrom<FolderRow> for Folder {
    type Error = StorageError;

    fn try_from(row: FolderRow) -> Result<Self> {
        Ok(Folder {
            id: decode_id("item_folder.id", &row.id)?,
            collection_id: decode_id("item_folder.collection_id", &row.collection_id)?,
            parent_id: decode_opt_id("item_folder.parent_id", row.parent_id.as_deref())?,
            name: row.name,
        })
    }
}

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Folder> {
    let row: Option<FolderRow> =
        sqlx::query_as("SELECT id, collection_id, parent_id, name FROM item_folder WHERE id = ?")
            .bind(id.to_vec())
            .fetch_optional(&mut *conn)
            .await?;
    row.ok_or_else(|| StorageError::not_found("folder", id))?
        .try_into()
}

/// Every folder of a collection. Unordered: ordering lives in `collection_items`.
pub async fn list(conn: &mut SqliteConnection, collection_id: Id) -> Result<Vec<Folder>> {
    let rows: Vec<FolderRow> = sqlx::query_as(
        "SELECT id, collection_id, parent_id, name FROM item_folder WHERE collection_id = ?",
    )
    .bind(collection_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Folder::try_from).collect()
}

pub async fn workspace_id(conn: &mut SqliteConnection, folder_id: Id) -> Result<Id> {
    let row: Option<Vec<u8>> = sqlx::query_scalar(
        "SELECT c.workspace_id FROM item_folder f JOIN collections c ON c.id = f.collection_id
         WHERE f.id = ?",
    )
    .bind(folder_id.to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(bytes) => decode_id("collections.workspace_id", &bytes),
        None => Err(StorageError::not_found("folder", folder_id)),
    }
}

pub async fn create(conn: &mut SqliteConnection, folder: &Folder) -> Result<()> {
    sqlx::query("INSERT INTO item_folder (id, collection_id, parent_id, name) VALUES (?, ?, ?, ?)")
        .bind(folder.id.to_vec())
        .bind(folder.collection_id.to_vec())
        .bind(opt_bytes(folder.parent_id))
        .bind(&folder.name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, folder: &Folder) -> Result<()> {
    let result = sqlx::query(
        "UPDATE item_folder SET collection_id = ?, parent_id = ?, name = ? WHERE id = ?",
    )
    .bind(folder.collection_id.to_vec())
    .bind(opt_bytes(folder.parent_id))
    .bind(&folder.name)
    .bind(folder.id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("folder", folder.id));
    }
    Ok(())
}

/// Rewrite the folder's collection and legacy parent.
pub async fn set_location(
    conn: &mut SqliteConnection,
    id: Id,
    collection_id: Id,
    parent_id: Option<Id>,
) -> Result<()> {
    let result = sqlx::query("UPDATE item_folder SET collection_id = ?, parent_id = ? WHERE id = ?")
        .bind(collection_id.to_vec())
        .bind(opt_bytes(parent_id))
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("folder", id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM item_folder WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("folder", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct FolderStore {
    pool: SqlitePool,
}

impl FolderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<Folder> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list(&self, collection_id: Id) -> Result<Vec<Folder>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn, collection_id).await
    }

    pub async fn workspace_id(&self, folder_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await?;
        workspace_id(&mut conn, folder_id).await
    }
}

/// Transaction-bound writer.
pub struct FolderWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> FolderWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<Folder> {
        get(self.conn, id).await
    }

    pub async fn create(&mut self, folder: &Folder) -> Result<()> {
        create(self.conn, folder).await
    }

    pub async fn update(&mut self, folder: &Folder) -> Result<()> {
        update(self.conn, folder).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}
