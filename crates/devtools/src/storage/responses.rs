use devtools_api::{ExampleResponse, Id};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id};

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: Vec<u8>,
    example_id: Vec<u8>,
    status: i64,
    body: Vec<u8>,
    duration_ms: i64,
    created_at: i64,
}

impl TryFrom<ResponseRow> for ExampleResponse {
    type Error = StorageError;

    fn try_from(row: ResponseRow) -> Result<Self> {
        Ok(ExampleResponse {
            id: decode_id("example_resp.id", &row.id)?,
            example_id: decode_id("example_resp.example_id", &row.example_id)?,
            status: row.status,
            body: row.body,
            duration_ms: row.duration_ms,
            created_at: row.created_at,
        })
    }
}

const SELECT: &str =
    "SELECT id, example_id, status, body, duration_ms, created_at FROM example_resp";

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<ExampleResponse> {
    let row: Option<ResponseRow> = sqlx::query_as(&format!("{SELECT} WHERE id = ?"))
        .bind(id.to_vec())
        .fetch_optional(&mut *conn)
        .await?;
    row.ok_or_else(|| StorageError::not_found("response", id))?
        .try_into()
}

/// Responses recorded for an example, newest first.
pub async fn list(conn: &mut SqliteConnection, example_id: Id) -> Result<Vec<ExampleResponse>> {
    let rows: Vec<ResponseRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE example_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(example_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(ExampleResponse::try_from).collect()
}

pub async fn create(conn: &mut SqliteConnection, response: &ExampleResponse) -> Result<()> {
    sqlx::query(
        "INSERT INTO example_resp (id, example_id, status, body, duration_ms, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(response.id.to_vec())
    .bind(response.example_id.to_vec())
    .bind(response.status)
    .bind(response.body.clone())
    .bind(response.duration_ms)
    .bind(response.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, response: &ExampleResponse) -> Result<()> {
    let result = sqlx::query(
        "UPDATE example_resp SET status = ?, body = ?, duration_ms = ? WHERE id = ?",
    )
    .bind(response.status)
    .bind(response.body.clone())
    .bind(response.duration_ms)
    .bind(response.id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("response", response.id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM example_resp WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("response", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct ResponseStore {
    pool: SqlitePool,
}

impl ResponseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<ExampleResponse> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list(&self, example_id: Id) -> Result<Vec<ExampleResponse>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn, example_id).await
    }
}

/// Transaction-bound writer.
pub struct ResponseWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> ResponseWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn create(&mut self, response: &ExampleResponse) -> Result<()> {
        create(self.conn, response).await
    }

    pub async fn update(&mut self, response: &ExampleResponse) -> Result<()> {
        update(self.conn, response).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::examples;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn test_responses_newest_first_and_cascade() {
        let fx = Fixture::new().await;
        let endpoint = fx.add_endpoint(None, "get").await;

        let older = ExampleResponse {
            id: Id::new_now(),
            example_id: endpoint.default_example_id,
            status: 200,
            body: b"ok".to_vec(),
            duration_ms: 12,
            created_at: 1_000,
        };
        let newer = ExampleResponse {
            id: Id::new_now(),
            created_at: 2_000,
            status: 500,
            ..older.clone()
        };

        let mut tx = fx.db.begin_write().await.unwrap();
        let mut writer = ResponseWriter::new(&mut tx).unwrap();
        writer.create(&older).await.unwrap();
        writer.create(&newer).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let store = ResponseStore::new(fx.db.pool().clone());
        let listed = store.list(endpoint.default_example_id).await.unwrap();
        assert_eq!(listed, vec![newer.clone(), older.clone()]);

        let mut tx = fx.db.begin_write().await.unwrap();
        examples::delete(tx.conn().unwrap(), endpoint.default_example_id)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        drop(tx);
        assert!(store.get(older.id).await.unwrap_err().is_not_found());
    }
}
