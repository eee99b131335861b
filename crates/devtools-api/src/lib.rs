pub mod entity;
pub mod error;
pub mod id;
pub mod messages;
pub mod streaming;

// Re-export identifier types
pub use id::{Id, IdError, ID_LEN, ID_TEXT_LEN};

// Re-export entity types
pub use entity::{
    Collection, CollectionItem, Endpoint, Environment, Example, ExampleResponse, Folder, ItemKind,
    ProviderType, Role, User, Workspace, WorkspaceMember,
};

// Re-export error types
pub use error::{ApiError, Code};

// Re-export streaming types
pub use streaming::{
    Batch, Change, CollectionItemSyncResponse, CollectionSyncResponse, EnvironmentSyncResponse,
    EventType, WorkspaceSyncResponse,
};

/// Decode a required id field from request bytes.
///
/// The field name is included in the error so clients can tell which input
/// was malformed.
pub fn parse_id(field: &str, bytes: &[u8]) -> Result<Id, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::invalid_argument(format!("{field} is required")));
    }
    Id::from_bytes(bytes).map_err(|e| ApiError::invalid_argument(format!("{field}: {e}")))
}

/// Decode an optional id field. Absent and empty values both mean "not set".
pub fn parse_optional_id(field: &str, bytes: Option<&[u8]>) -> Result<Option<Id>, ApiError> {
    match bytes {
        None => Ok(None),
        Some([]) => Ok(None),
        Some(bytes) => parse_id(field, bytes).map(Some),
    }
}
