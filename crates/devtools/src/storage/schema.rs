use sqlx::SqliteConnection;

use crate::storage::types::Result;

/// DDL applied at open. Ids are 16-byte BLOBs, timestamps Unix milliseconds.
///
/// `collection_items.prev_id`/`next_id` carry no foreign key: pointers are
/// rewritten mid-transaction and only have to be consistent at commit.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id BLOB PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash BLOB,
        provider_type INTEGER NOT NULL DEFAULT 0,
        provider_id TEXT,
        external_id TEXT,
        name TEXT NOT NULL DEFAULT '',
        image TEXT
    )",
    "CREATE TABLE IF NOT EXISTS workspaces (
        id BLOB PRIMARY KEY,
        name TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        collection_count INTEGER NOT NULL DEFAULT 0,
        flow_count INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS workspaces_users (
        id BLOB PRIMARY KEY,
        workspace_id BLOB NOT NULL REFERENCES workspaces (id) ON DELETE CASCADE,
        user_id BLOB NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        role INTEGER NOT NULL,
        UNIQUE (workspace_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS collections (
        id BLOB PRIMARY KEY,
        workspace_id BLOB NOT NULL REFERENCES workspaces (id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS collections_workspace ON collections (workspace_id)",
    "CREATE TABLE IF NOT EXISTS item_folder (
        id BLOB PRIMARY KEY,
        collection_id BLOB NOT NULL REFERENCES collections (id) ON DELETE CASCADE,
        parent_id BLOB REFERENCES item_folder (id) ON DELETE CASCADE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS item_api (
        id BLOB PRIMARY KEY,
        collection_id BLOB NOT NULL REFERENCES collections (id) ON DELETE CASCADE,
        folder_id BLOB REFERENCES item_folder (id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        method TEXT NOT NULL,
        url TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS item_api_example (
        id BLOB PRIMARY KEY,
        item_api_id BLOB NOT NULL REFERENCES item_api (id) ON DELETE CASCADE,
        collection_id BLOB NOT NULL REFERENCES collections (id) ON DELETE CASCADE,
        is_default INTEGER NOT NULL DEFAULT 0,
        name TEXT NOT NULL,
        body TEXT
    )",
    "CREATE TABLE IF NOT EXISTS example_resp (
        id BLOB PRIMARY KEY,
        example_id BLOB NOT NULL REFERENCES item_api_example (id) ON DELETE CASCADE,
        status INTEGER NOT NULL,
        body BLOB NOT NULL,
        duration_ms INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS environment (
        id BLOB PRIMARY KEY,
        workspace_id BLOB NOT NULL REFERENCES workspaces (id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        is_global INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS collection_items (
        id BLOB PRIMARY KEY,
        collection_id BLOB NOT NULL REFERENCES collections (id) ON DELETE CASCADE,
        parent_folder_id BLOB REFERENCES collection_items (id) ON DELETE CASCADE,
        item_type INTEGER NOT NULL,
        folder_id BLOB UNIQUE REFERENCES item_folder (id) ON DELETE CASCADE,
        endpoint_id BLOB UNIQUE REFERENCES item_api (id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        prev_id BLOB,
        next_id BLOB,
        CHECK (
            (item_type = 0 AND folder_id IS NOT NULL AND endpoint_id IS NULL)
            OR (item_type = 1 AND endpoint_id IS NOT NULL AND folder_id IS NULL)
        )
    )",
    "CREATE INDEX IF NOT EXISTS collection_items_scope
        ON collection_items (collection_id, parent_folder_id)",
];

/// Apply every statement of [`SCHEMA`]. Idempotent.
pub async fn apply(conn: &mut SqliteConnection) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(&mut *conn).await?;
    }
    tracing::debug!("[Schema] Applied {} statements", SCHEMA.len());
    Ok(())
}
