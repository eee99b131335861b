use devtools_api::{Id, ProviderType, User};
use sqlx::{SqliteConnection, SqlitePool};

use crate::storage::db::WriteTx;
use crate::storage::types::{Result, StorageError, decode_id};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Vec<u8>,
    email: String,
    password_hash: Option<Vec<u8>>,
    provider_type: i64,
    provider_id: Option<String>,
    external_id: Option<String>,
    name: String,
    image: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self> {
        let provider_type = ProviderType::from_i64(row.provider_type).ok_or_else(|| {
            StorageError::Corrupted(format!("unknown provider_type {}", row.provider_type))
        })?;
        Ok(User {
            id: decode_id("users.id", &row.id)?,
            email: row.email,
            password_hash: row.password_hash,
            provider_type,
            provider_id: row.provider_id,
            external_id: row.external_id,
            name: row.name,
            image: row.image,
        })
    }
}

const SELECT: &str = "SELECT id, email, password_hash, provider_type, provider_id, external_id, name, image FROM users";

pub async fn get(conn: &mut SqliteConnection, id: Id) -> Result<User> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT} WHERE id = ?"))
        .bind(id.to_vec())
        .fetch_optional(&mut *conn)
        .await?;
    row.ok_or_else(|| StorageError::not_found("user", id))?
        .try_into()
}

pub async fn get_by_email(conn: &mut SqliteConnection, email: &str) -> Result<User> {
    let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT} WHERE email = ?"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    row.ok_or_else(|| StorageError::not_found("user", email))?
        .try_into()
}

/// Members of a workspace, ordered by id.
pub async fn list_by_workspace(conn: &mut SqliteConnection, workspace_id: Id) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT u.id, u.email, u.password_hash, u.provider_type, u.provider_id, u.external_id, u.name, u.image
         FROM users u JOIN workspaces_users wu ON wu.user_id = u.id
         WHERE wu.workspace_id = ? ORDER BY u.id",
    )
    .bind(workspace_id.to_vec())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(User::try_from).collect()
}

pub async fn create(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, email, password_hash, provider_type, provider_id, external_id, name, image)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id.to_vec())
    .bind(&user.email)
    .bind(user.password_hash.clone())
    .bind(user.provider_type.as_i64())
    .bind(user.provider_id.clone())
    .bind(user.external_id.clone())
    .bind(&user.name)
    .bind(user.image.clone())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET email = ?, password_hash = ?, provider_type = ?, provider_id = ?,
         external_id = ?, name = ?, image = ? WHERE id = ?",
    )
    .bind(&user.email)
    .bind(user.password_hash.clone())
    .bind(user.provider_type.as_i64())
    .bind(user.provider_id.clone())
    .bind(user.external_id.clone())
    .bind(&user.name)
    .bind(user.image.clone())
    .bind(user.id.to_vec())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("user", user.id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: Id) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.to_vec())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StorageError::not_found("user", id));
    }
    Ok(())
}

/// Pool-bound reader.
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Id) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        get(&mut conn, id).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        get_by_email(&mut conn, email).await
    }

    pub async fn list_by_workspace(&self, workspace_id: Id) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await?;
        list_by_workspace(&mut conn, workspace_id).await
    }
}

/// Transaction-bound writer.
pub struct UserWriter<'t> {
    conn: &'t mut SqliteConnection,
}

impl<'t> UserWriter<'t> {
    pub fn new(tx: &'t mut WriteTx) -> Result<Self> {
        Ok(Self { conn: tx.conn()? })
    }

    pub async fn get(&mut self, id: Id) -> Result<User> {
        get(self.conn, id).await
    }

    pub async fn get_by_email(&mut self, email: &str) -> Result<User> {
        get_by_email(self.conn, email).await
    }

    pub async fn create(&mut self, user: &User) -> Result<()> {
        create(self.conn, user).await
    }

    pub async fn update(&mut self, user: &User) -> Result<()> {
        update(self.conn, user).await
    }

    pub async fn delete(&mut self, id: Id) -> Result<()> {
        delete(self.conn, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn sample_user(email: &str) -> User {
        User {
            id: Id::new_now(),
            email: email.to_string(),
            password_hash: Some(vec![1, 2, 3]),
            provider_type: ProviderType::Google,
            provider_id: Some("google".to_string()),
            external_id: None,
            name: "Ada".to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_user_crud() {
        let db = Database::open_in_memory().await.unwrap();
        let mut user = sample_user("ada@example.com");

        let mut tx = db.begin_write().await.unwrap();
        UserWriter::new(&mut tx).unwrap().create(&user).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let store = UserStore::new(db.pool().clone());
        assert_eq!(store.get(user.id).await.unwrap(), user);
        assert_eq!(store.get_by_email("ada@example.com").await.unwrap().id, user.id);

        user.name = "Ada L.".to_string();
        let mut tx = db.begin_write().await.unwrap();
        UserWriter::new(&mut tx).unwrap().update(&user).await.unwrap();
        UserWriter::new(&mut tx).unwrap().delete(user.id).await.unwrap();
        let err = UserWriter::new(&mut tx).unwrap().delete(user.id).await.unwrap_err();
        assert!(err.is_not_found());
        tx.commit().await.unwrap();
        drop(tx);

        assert!(store.get(user.id).await.unwrap_err().is_not_found());
    }
}
