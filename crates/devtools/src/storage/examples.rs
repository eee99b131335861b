use devtools_api::{Example, Id};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id};

#[derive(sqlx::FromRow)]
struct ExampleRow {
    id: Vec<u8>,
    item_api_id: Vec<u8>,
    collection_id: Vec<u8>,
    is_default: bool,
    name: String,
    body: Option<String>,
}

impl TryFrom<ExampleRow> for Example {
    type Error = StorageError;

    fn try_from(row: ExampleRow) -> Result<Self> {
        Ok(Example {
            id: decode_id("item_api_example.id", &row.id)?,
            endpoint_id: decode_id("item_api_example.item_api_id", &row.item_api_id)?,
            collection_id: decode_id("item_api_example.collection_id", &row.collection_id)?,
            is_default: row.is_default,
            name: row.name,
            body: row.body,
        })
    }
}

const SELECT: &str =
    "SELECT id, item_api_id, collection_id, is_default, name, body FROM item_api_example";

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Example> {
    let row: Option<ExampleRow> = sqlx::query_as(&format!("{SELECT} WHERE id = ?"))
        .bind(id.to_vec())
        .fetch_optional(&mut *conn)
        .await?;
    row.ok_or_else(|| StorageError::not_found("example", id))?
        .try_into()
}

/// Examples of an endpoint, default first, then by creation.
pub async fn list(conn: &mut SqliteConnection, endpoint_id: Id) -> Result<Vec<Example>> {
    let rows: Vec<ExampleRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE item_api_id = ? ORDER BY is_default DESC, id"
    ))
    .bind(endpoint_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Example::try_from).collect()
}

pub async fn get_default(conn: &mut SqliteConnection, endpoint_id: Id) -> Result<Example> {
    let row: Option<ExampleRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE item_api_id = ? AND is_default = 1 LIMIT 1"
    ))
    .bind(endpoint_id.to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    row.ok_or_else(|| StorageError::not_found("default example of endpoint", endpoint_id))?
        .try_into()
}

pub async fn workspace_id(conn: &mut SqliteConnection, example_id: Id) -> Result<Id> {
    let row: Option<Vec<u8>> = sqlx::query_scalar(
        "SELECT c.workspace_id FROM item_api_example e JOIN collections c ON c.id = e.collection_id
         WHERE e.id = ?",
    )
    .bind(example_id.to_vec())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(bytes) => decode_id("collections.workspace_id", &bytes),
        None => Err(StorageError::not_found("example", example_id)),
    }
}

pub async fn create(conn: &mut SqliteConnection, example: &Example) -> Result<()> {
    sqlx::query(
        "INSERT INTO item_api_example (id, item_api_id, collection_id, is_default, name, body)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(example.id.to_vec())
    .bind(example.endpoint_id.to_vec())
    .bind(example.collection_id.to_vec())
    .bind(example.is_default)
    .bind(&example.name)
    .bind(example.body.clone())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, example: &Example) -> Result<()> {
    let result = sqlx::query("UPDATE item_api_example SET name = ?, body = ? WHERE id = ?")
        .bind(&example.name)
        .bind(example.body.clone())
        .bind(example.id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("example", example.id));
    }
    Ok(())
}

/// Follow an endpoint into another collection.
pub async fn set_collection_for_endpoint(
    conn: &mut SqliteConnection,
    endpoint_id: Id,
    collection_id: Id,
) -> Result<u64> {
    let result = sqlx::query("UPDATE item_api_example SET collection_id = ? WHERE item_api_id = ?")
        .bind(collection_id.to_vec())
        .bind(endpoint_id.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM item_api_example WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("example", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct ExampleStore {
    pool: SqlitePool,
}

impl ExampleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<Example> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list(&self, endpoint_id: Id) -> Result<Vec<Example>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn, endpoint_id).await
    }

    pub async fn get_default(&self, endpoint_id: Id) -> Result<Example> {
        let mut conn = self.pool.acquire().await?;
        get_default(&mut conn, endpoint_id).await
    }

    pub async fn workspace_id(&self, example_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await?;
        workspace_id(&mut conn, example_id).await
    }
}

/// Transaction-bound writer.
pub struct ExampleWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> ExampleWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<Example> {
        get(self.conn, id).await
    }

    pub async fn list(&mut self, endpoint_id: Id) -> Result<Vec<Example>> {
        list(self.conn, endpoint_id).await
    }

    pub async fn create(&mut self, example: &Example) -> Result<()> {
        create(self.conn, example).await
    }

    pub async fn update(&mut self, example: &Example) -> Result<()> {
        update(self.conn, example).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}
