use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::IdError;

/// Caller-visible status code of a failed RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    /// Malformed id bytes, missing required field, self reference,
    /// unspecified kind, contradictory position
    InvalidArgument,
    /// Target absent or not visible to the caller
    NotFound,
    /// Caller is authenticated but not allowed to touch the resource
    PermissionDenied,
    /// No user on the request context
    Unauthenticated,
    /// Database failure, consistency violation, cancellation mid-write
    Internal,
    /// Endpoint intentionally rejected
    Unimplemented,
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Code::InvalidArgument => "invalid_argument",
            Code::NotFound => "not_found",
            Code::PermissionDenied => "permission_denied",
            Code::Unauthenticated => "unauthenticated",
            Code::Internal => "internal",
            Code::Unimplemented => "unimplemented",
        };
        f.write_str(name)
    }
}

/// Error returned from every RPC handler.
///
/// Lower layers keep their own typed errors; conversion into `ApiError`
/// happens once, at the handler boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: Code,
    pub message: String,
}

impl ApiError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(Code::Unauthenticated, "no user on request context")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::invalid_argument(err.to_string())
    }
}
