use devtools_api::{Environment, Id};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id};

#[derive(sqlx::FromRow)]
struct EnvironmentRow {
    id: Vec<u8>,
    workspace_id: Vec<u8>,
    name: String,
    description: String,
    is_global: bool,
    updated_at: i64,
}

impl TryFrom<EnvironmentRow> for Environment {
    type Error = StorageError;

    fn try_from(row: EnvironmentRow) -> Result<Self> {
        Ok(Environment {
            id: decode_id("environment.id", &row.id)?,
            workspace_id: decode_id("environment.workspace_id", &row.workspace_id)?,
            name: row.name,
            description: row.description,
            is_global: row.is_global,
            updated_at: row.updated_at,
        })
    }
}

const SELECT: &str =
    "SELECT id, workspace_id, name, description, is_global, updated_at FROM environment";

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<Environment> {
    let row: Option<EnvironmentRow> = sqlx::query_as(&format!("{SELECT} WHERE id = ?"))
        .bind(id.to_vec())
        .fetch_optional(&mut *conn)
        .await?;
    row.ok_or_else(|| StorageError::not_found("environment", id))?
        .try_into()
}

/// Environments of a workspace, the global one first.
pub async fn list(conn: &mut SqliteConnection, workspace_id: Id) -> Result<Vec<Environment>> {
    let rows: Vec<EnvironmentRow> = sqlx::query_as(&format!(
        "{SELECT} WHERE workspace_id = ? ORDER BY is_global DESC, id"
    ))
    .bind(workspace_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Environment::try_from).collect()
}

pub async fn workspace_id(conn: &mut SqliteConnection, environment_id: Id) -> Result<Id> {
    let row: Option<Vec<u8>> =
        sqlx::query_scalar("SELECT workspace_id FROM environment WHERE id = ?")
            .bind(environment_id.to_vec())
            .fetch_optional(&mut *conn)
            .await?;
    match row {
        Some(bytes) => decode_id("environment.workspace_id", &bytes),
        None => Err(StorageError::not_found("environment", environment_id)),
    }
}

pub async fn create(conn: &mut SqliteConnection, environment: &Environment) -> Result<()> {
    sqlx::query(
        "INSERT INTO environment (id, workspace_id, name, description, is_global, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(environment.id.to_vec())
    .bind(environment.workspace_id.to_vec())
    .bind(&environment.name)
    .bind(&environment.description)
    .bind(environment.is_global)
    .bind(environment.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, environment: &Environment) -> Result<()> {
    let result = sqlx::query(
        "UPDATE environment SET name = ?, description = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&environment.name)
    .bind(&environment.description)
    .bind(environment.updated_at)
    .bind(environment.id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("environment", environment.id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM environment WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("environment", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    pool: SqlitePool,
}

impl EnvironmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<Environment> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn list(&self, workspace_id: Id) -> Result<Vec<Environment>> {
        let mut conn = self.pool.acquire().await?;
        list(&mut conn, workspace_id).await
    }

    pub async fn workspace_id(&self, environment_id: Id) -> Result<Id> {
        let mut conn = self.pool.acquire().await?;
        workspace_id(&mut conn, environment_id).await
    }
}

/// Transaction-bound writer.
pub struct EnvironmentWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> EnvironmentWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<Environment> {
        get(self.conn, id).await
    }

    pub async fn create(&mut self, environment: &Environment) -> Result<()> {
        create(self.conn, environment).await
    }

    pub async fn update(&mut self, environment: &Environment) -> Result<()> {
        update(self.conn, environment).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}
