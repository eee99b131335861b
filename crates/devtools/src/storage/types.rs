use devtools_api::{Id, ItemKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored state violates a structural invariant (broken chain, bad id bytes)
    #[error("Corrupted state: {0}")]
    Corrupted(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl StorageError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        StorageError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Decode a stored id column.
pub(crate) fn decode_id(column: &str, bytes: &[u8]) -> Result<Id> {
    Id::from_bytes(bytes).map_err(|e| StorageError::Corrupted(format!("{column}: {e}")))
}

pub(crate) fn decode_opt_id(column: &str, bytes: Option<&[u8]>) -> Result<Option<Id>> {
    bytes.map(|b| decode_id(column, b)).transpose()
}

/// Bind form of an optional id.
pub(crate) fn opt_bytes(id: Option<Id>) -> Option<Vec<u8>> {
    id.map(|id| id.to_vec())
}

/// `item_type` column value of a collection item.
pub(crate) fn kind_to_i64(kind: ItemKind) -> Result<i64> {
    match kind {
        ItemKind::Folder => Ok(0),
        ItemKind::Endpoint => Ok(1),
        ItemKind::Unspecified => Err(StorageError::InvalidArgument(
            "item kind must be specified".to_string(),
        )),
    }
}

pub(crate) fn kind_from_i64(value: i64) -> Result<ItemKind> {
    match value {
        0 => Ok(ItemKind::Folder),
        1 => Ok(ItemKind::Endpoint),
        other => Err(StorageError::Corrupted(format!("unknown item_type {other}"))),
    }
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_column_values() {
        assert_eq!(kind_to_i64(ItemKind::Folder).unwrap(), 0);
        assert_eq!(kind_to_i64(ItemKind::Endpoint).unwrap(), 1);
        assert!(kind_to_i64(ItemKind::Unspecified).is_err());
        assert_eq!(kind_from_i64(1).unwrap(), ItemKind::Endpoint);
        assert!(matches!(kind_from_i64(7), Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn test_decode_id_reports_column() {
        let err = decode_id("prev_id", &[0u8; 3]).unwrap_err();
        match err {
            StorageError::Corrupted(msg) => assert!(msg.starts_with("prev_id")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
