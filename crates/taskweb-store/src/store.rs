//! The document store contract.

use async_trait::async_trait;

use crate::document::{Document, Fields, SetMode, WriteBatch};
use crate::error::StoreError;
use crate::path::DocPath;
use crate::query::Query;
use crate::subscription::Subscription;

/// A realtime document database.
///
/// Point operations are async and may suspend; live subscriptions deliver
/// complete snapshots on a [`Subscription`] stream, starting with the
/// current state. Writes are last-write-wins per field.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The store's notion of "now", used to resolve server timestamps.
    fn now_millis(&self) -> u64;

    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// One-shot query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Apply every write in `batch` atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Live subscription to one document.
    fn watch_document(&self, path: &DocPath) -> Subscription;

    /// Live subscription to a query's result set.
    fn watch_query(&self, query: &Query) -> Subscription;

    /// Point write.
    async fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(path.clone(), fields, mode);
        self.commit(batch).await
    }

    /// Partial update of an existing document; `NotFound` if absent.
    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.update(path.clone(), fields);
        self.commit(batch).await
    }

    /// Point delete. Deleting an absent document succeeds.
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(path.clone());
        self.commit(batch).await
    }
}
