use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::config::DatabaseConfig;
use crate::storage::schema;
use crate::storage::types::{Result, StorageError};

/// Process-wide handle to the SQLite pool.
///
/// Cloning is cheap; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) a file-backed database and apply the schema.
    pub async fn open<P: AsRef<Path>>(path: P, config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::info!(
            "[Database] Opened {} (max_connections={})",
            path.as_ref().display(),
            config.max_connections
        );

        let db = Self { pool };
        db.apply_schema().await?;
        Ok(db)
    }

    /// In-memory database for tests and ephemeral sessions.
    ///
    /// SQLite gives every connection its own in-memory database, so the pool is
    /// pinned to exactly one connection that never expires. Callers must not
    /// acquire a second connection while a [`WriteTx`] is open on the same task.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.apply_schema().await?;
        Ok(db)
    }

    async fn apply_schema(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        schema::apply(&mut conn).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Begin a write transaction.
    pub async fn begin_write(&self) -> Result<WriteTx> {
        let tx = self.pool.begin().await?;
        Ok(WriteTx { tx: Some(tx) })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Scoped write transaction.
///
/// Exactly one of [`commit`](WriteTx::commit) or a rollback happens: an
/// explicit [`rollback`](WriteTx::rollback), or implicitly when the guard is
/// dropped uncommitted (early `?` return, panic unwinding, or the owning
/// future being cancelled).
pub struct WriteTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl WriteTx {
    /// Connection of the in-flight transaction.
    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(StorageError::DatabaseError(
                "transaction already finished".to_string(),
            )),
        }
    }

    pub async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(())
            }
            None => Err(StorageError::DatabaseError(
                "transaction already finished".to_string(),
            )),
        }
    }

    /// Roll back; a no-op once committed or rolled back.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.tx.is_none()
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        // sqlx queues the ROLLBACK on the connection when a transaction drops
        if self.tx.take().is_some() {
            tracing::debug!("[WriteTx] Dropped without commit, rolling back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn count_workspaces(db: &Database) -> i64 {
        let mut conn = db.acquire().await.unwrap();
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workspaces")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    async fn insert_workspace(tx: &mut WriteTx) {
        sqlx::query("INSERT INTO workspaces (id, name, updated_at) VALUES (?, 'w', 0)")
            .bind(devtools_api::Id::new_now().to_vec())
            .execute(tx.conn().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let db = Database::open_in_memory().await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        insert_workspace(&mut tx).await;
        tx.commit().await.unwrap();
        drop(tx);
        assert_eq!(count_workspaces(&db).await, 1);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = Database::open_in_memory().await.unwrap();
        {
            let mut tx = db.begin_write().await.unwrap();
            insert_workspace(&mut tx).await;
        }
        assert_eq!(count_workspaces(&db).await, 0);
    }

    #[tokio::test]
    async fn test_rollback_after_commit_is_noop() {
        let db = Database::open_in_memory().await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        insert_workspace(&mut tx).await;
        tx.commit().await.unwrap();
        tx.rollback().await.unwrap();
        assert!(tx.is_finished());
        assert!(tx.conn().is_err());
        drop(tx);
        assert_eq!(count_workspaces(&db).await, 1);
    }

    #[tokio::test]
    async fn test_explicit_rollback() {
        let db = Database::open_in_memory().await.unwrap();
        let mut tx = db.begin_write().await.unwrap();
        insert_workspace(&mut tx).await;
        tx.rollback().await.unwrap();
        assert!(tx.commit().await.is_err());
        drop(tx);
        assert_eq!(count_workspaces(&db).await, 0);
    }
}
