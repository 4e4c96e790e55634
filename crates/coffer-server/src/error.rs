use uuid::Uuid;

use coffer_core::ValidationError;
use coffer_core::hierarchy::HierarchyError;
use coffer_core::resolver::ResolveError;
use coffer_storage::StorageError;

/// Closed classification of [`AccessError`] for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Forbidden,
    Conflict,
    NotFound,
    CircularMove,
    MaxDepthExceeded,
    Infrastructure,
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot move folder {folder_id} under {target_id}: circular move")]
    CircularMove { folder_id: Uuid, target_id: Uuid },

    #[error("folder depth {depth} exceeds maximum of {max}")]
    MaxDepthExceeded { depth: u32, max: u32 },

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Validation(_) => ErrorKind::Validation,
            AccessError::Forbidden(_) => ErrorKind::Forbidden,
            AccessError::Conflict(_) => ErrorKind::Conflict,
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::CircularMove { .. } => ErrorKind::CircularMove,
            AccessError::MaxDepthExceeded { .. } => ErrorKind::MaxDepthExceeded,
            AccessError::Resolve(_) | AccessError::Storage(_) => ErrorKind::Infrastructure,
        }
    }
}

impl From<StorageError> for AccessError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate(what) => AccessError::Conflict(what),
            StorageError::NotFound(what) => AccessError::NotFound(what),
            other => AccessError::Storage(other),
        }
    }
}

impl From<HierarchyError> for AccessError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::CircularMove {
                folder_id,
                target_id,
            } => AccessError::CircularMove {
                folder_id,
                target_id,
            },
            HierarchyError::MaxDepthExceeded { depth, max } => {
                AccessError::MaxDepthExceeded { depth, max }
            }
        }
    }
}
