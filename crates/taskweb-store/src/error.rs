//! Error types for document store operations.

use thiserror::Error;

/// Errors reported by a [`DocumentStore`](crate::DocumentStore), either as
/// the result of a point operation or as an event on a live subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Document absent (only `update` and typed reads report this).
    #[error("document not found: {0}")]
    NotFound(String),

    /// The store's security rules rejected the read, write, or listen.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Network or backend failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An atomic batch failed; none of its writes were applied.
    #[error("batch failed: {0}")]
    BatchFailed(String),

    /// A stored document did not match the expected record shape.
    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },
}

impl StoreError {
    /// Permission errors get a user-visible notice on listeners.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
