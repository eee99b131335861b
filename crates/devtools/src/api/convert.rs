//! Typed errors of the lower layers mapped onto caller-visible codes.
//!
//! This is the only place the mapping happens. Internal causes are logged
//! here and replaced by a generic message.

use devtools_api::ApiError;

use crate::moves::MoveError;
use crate::permission::PermissionError;
use crate::storage::StorageError;
use crate::sync::SyncError;

fn internal(layer: &str, cause: &dyn std::fmt::Display) -> ApiError {
    tracing::error!("[Rpc] {} failure: {}", layer, cause);
    ApiError::internal("internal error")
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, .. } => ApiError::not_found(format!("{entity} not found")),
            StorageError::InvalidArgument(message) => ApiError::invalid_argument(message),
            other => internal("storage", &other),
        }
    }
}

impl From<PermissionError> for ApiError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::NotFound(entity) => ApiError::not_found(format!("{entity} not found")),
            PermissionError::Denied(message) => ApiError::permission_denied(message),
            PermissionError::Storage(inner) => inner.into(),
        }
    }
}

impl From<MoveError> for ApiError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::InvalidArgument(message) => ApiError::invalid_argument(message),
            MoveError::NotFound(entity) => ApiError::not_found(format!("{entity} not found")),
            MoveError::PermissionDenied(message) => ApiError::permission_denied(message),
            MoveError::Storage(inner) => inner.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        internal("sync", &err)
    }
}
