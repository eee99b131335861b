use devtools_api::{Endpoint, Id};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id, decode_opt_id, opt_bytes};

#[derive(sqlx::FromRow)]
struct EndpointRow {
    id: Vec<u8>,
    collection_id: Vec<u8>,
    folder_id: Option<Vec<u8>>,
    name: String,
    method: String,
    url: String,
}

impl TryFrom<EndpointRow> for Endpoint {
    type Error = StorageError;

    fn try_from(row: EndpointRow) -> Result<Self> {
        Ok(Endpoint {
            id: decode_id("item_api.id", &row.id)?,
            collection_id: decode_id("item_api.collection_id", &row.collection_id)?,
            folder_id: decode_opt_id("item_api.folder_id", row.folder_id.as_deref())?,
            name: row.name,
            method: row.method,
            url: row.url,
        })
    }
}

const SELECT: &str = "SELECT id, collection_id, folder_id, name, method, url FROM item_api";

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Endpoint> {
    let row: Option<EndpointRow> = sqlx::query_as(&format!("{SELECT} WHERE id = ?"))
        .bind(id.to_vec())
        .fetch_optional(&mut *conn)
        .await?;
    row.ok_or_else(|| StorageError::not_found("endpoint", id))?
        .try_into()
}

/// Every endpoint of a collection. Unordered.
pub async fn list(conn: &mut SqliteConnection, collection_id: Id) -> Result<Vec<Endpoint>> {
    let rows: Vec<EndpointRow> = sqlx::query_as(&format!("{SELECT} WHERE collection_id = ?"))
        .bind(collection_id.to_vec())
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(Endpoint::try_from).collect()
}

pub async fn workspace_id(conn: &mut SqliteConnection, endpoint_id: Id) -> Result<Id> {
    let row: Option<Vec<u8>> = sqlx::query_scalar(
        "SELECT c.workspace_id FROM item_api a JOIN collections c ON c.id = a.collection_id
         WHERE a.id = ?",
    )
    .bind(endpoint_id.to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(bytes) => decode_id("collections.workspace_id", &bytes),
        None => Err(StorageError::not_found("endpoint", endpoint_id)),
    }
}

pub async fn create(conn: &mut SqliteConnection, endpoint: &Endpoint) -> Result<()> {
    sqlx::query(
        "INSERT INTO item_api (id, collection_id, folder_id, name, method, url)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(endpoint.id.to_vec())
    .bind(endpoint.collection_id.to_vec())
    .bind(opt_bytes(endpoint.folder_id))
    .bind(&endpoint.name)
    .bind(&endpoint.method)
    .bind(&endpoint.url)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, endpoint: &Endpoint) -> Result<()> {
    let result = sqlx::query(
        "UPDATE item_api SET collection_id = ?, folder_id = ?, name = ?, method = ?, url = ?
         WHERE id = ?",
    )
    .bind(endpoint.collection_id.to_vec())
    .bind(opt_bytes(endpoint.folder_id))
    .bind(&endpoint.name)
    .bind(&endpoint.method)
    .bind(&endpoint.url)
    .bind(endpoint.id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("endpoint", endpoint.id));
    }
    Ok(())
}

/// Rewrite the endpoint's collection and legacy folder.
pub async fn set_location(
    conn: &mut SqliteConnection,
    id: Id,
    collection_id: Id,
    folder_id: Option<Id>,
) -> Result<()> {
    let result = sqlx::query("UPDATE item_api SET collection_id = ?, folder_id = ? WHERE id = ?")
        .bind(collection_id.to_vec())
        .bind(opt_bytes(folder_id))
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("endpoint", id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM item_api WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("endpoint", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct EndpointStore {
    pool: SqlitePool,
}

impl EndpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<Endpoint> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list(&self, collection_id: Id) -> Result<Vec<Endpoint>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn, collection_id).await
    }

    pub async fn workspace_id(&self, endpoint_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await?;
        workspace_id(&mut conn, endpoint_id).await
    }
}

/// Transaction-bound writer.
pub struct EndpointWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> EndpointWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<Endpoint> {
        get(self.conn, id).await
    }

    pub async fn create(&mut self, endpoint: &Endpoint) -> Result<()> {
        create(self.conn, endpoint).await
    }

    pub async fn update(&mut self, endpoint: &Endpoint) -> Result<()> {
        update(self.conn, endpoint).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}
