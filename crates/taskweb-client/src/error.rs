//! Error types for board operations.

use taskweb_store::StoreError;
use taskweb_types::{TaskId, UserId};
use thiserror::Error;

/// Which uniqueness or emptiness rule a command ran into.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Each user owns at most one non-collaborative board.
    #[error("you already have a solo board")]
    SoloBoardExists,

    /// Columns can only be deleted once every task has left them.
    #[error("column contains tasks; move or delete them first")]
    ColumnNotEmpty,
}

/// Errors from board, column, and task operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// Board, column, or task does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Ownership or collaboration check failed, or the store refused access.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Another user holds the task's edit lock.
    #[error("task {task} is being edited by another user ({holder})")]
    Locked { task: TaskId, holder: UserId },

    /// The operation would break a board invariant.
    #[error("{0}")]
    Conflict(ConflictKind),

    /// Backend or network failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(StoreError),

    /// Rejected input (empty titles, duplicate IDs).
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The operation needs a bound board and none is bound.
    #[error("no board is loaded")]
    NotBound,

    /// Startup failed (auth or store). Fatal, never retried.
    #[error("initialization failed: {0}")]
    Initialization(String),
}

impl From<StoreError> for BoardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => Self::NotFound(path),
            StoreError::PermissionDenied(path) => Self::AccessDenied(path),
            other => Self::StoreUnavailable(other),
        }
    }
}

impl From<ConflictKind> for BoardError {
    fn from(kind: ConflictKind) -> Self {
        Self::Conflict(kind)
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        assert_eq!(
            BoardError::from(StoreError::NotFound("boards/x".into())),
            BoardError::NotFound("boards/x".into())
        );
        assert!(matches!(
            BoardError::from(StoreError::PermissionDenied("boards/x".into())),
            BoardError::AccessDenied(_)
        ));
        assert!(matches!(
            BoardError::from(StoreError::BatchFailed("boom".into())),
            BoardError::StoreUnavailable(StoreError::BatchFailed(_))
        ));
    }

    #[test]
    fn test_conflict_messages() {
        let err = BoardError::from(ConflictKind::ColumnNotEmpty);
        assert_eq!(err.to_string(), "column contains tasks; move or delete them first");
    }
}
