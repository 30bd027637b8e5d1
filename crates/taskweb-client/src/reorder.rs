//! Reindexing ordered collections after drag-and-drop.
//!
//! Orders are sparse display hints, not dense ranks:
//!
//! - A column reorder rewrites every column's `order` to its new index, in
//!   one atomic batch.
//! - A task move rewrites only the moved task. Siblings keep their orders,
//!   so gaps and duplicates are expected and display falls back to a stable
//!   sort.
//!
//! Redundant events (a drop back onto the same spot) rewrite the same values
//! and are harmless.

use std::collections::HashSet;

use taskweb_store::{Fields, WriteBatch};
use taskweb_types::{BoardId, ColumnId, TaskId};
use tracing::debug;

use crate::commands::Commands;
use crate::error::{BoardError, Result};
use crate::schema::{self, field};

/// An event from the drag-and-drop layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReorderEvent {
    /// Columns in their new left-to-right order.
    ColumnsReordered(Vec<ColumnId>),
    /// A task dropped into `column` at `index`.
    TaskMoved { task: TaskId, column: ColumnId, index: usize },
}

impl Commands {
    /// Persist `order = index` for each column, all or nothing.
    pub async fn reorder_columns(&self, board_id: BoardId, column_ids: &[ColumnId]) -> Result<()> {
        let mut seen = HashSet::with_capacity(column_ids.len());
        if let Some(dup) = column_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(BoardError::Invalid(format!("column {dup} listed twice")));
        }
        if column_ids.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::new();
        for (index, id) in column_ids.iter().enumerate() {
            batch.update(
                schema::column(board_id, *id),
                Fields::new()
                    .set(field::ORDER, index as i64)
                    .server_timestamp(field::UPDATED_AT),
            );
        }
        self.store.commit(batch).await?;

        debug!(board = %board_id, columns = column_ids.len(), "reordered columns");
        Ok(())
    }

    /// Move one task to `column` at `index`. No other task is rewritten.
    pub async fn move_task(&self, board_id: BoardId, id: TaskId, column: ColumnId, index: usize) -> Result<()> {
        let fields = Fields::new()
            .set(field::COLUMN_ID, column)
            .set(field::ORDER, index as i64)
            .server_timestamp(field::UPDATED_AT);
        self.store.update(&schema::task(board_id, id), fields).await?;

        debug!(board = %board_id, task = %id, column = %column, index, "moved task");
        Ok(())
    }

    /// Dispatch a drag-and-drop event.
    pub async fn apply_reorder(&self, board_id: BoardId, event: ReorderEvent) -> Result<()> {
        match event {
            ReorderEvent::ColumnsReordered(ids) => self.reorder_columns(board_id, &ids).await,
            ReorderEvent::TaskMoved { task, column, index } => {
                self.move_task(board_id, task, column, index).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::config::ClientConfig;
    use std::sync::Arc;
    use taskweb_store::{DocumentStore, MemoryStore, Query};
    use taskweb_types::{TaskDraft, UserId};

    async fn setup() -> (Arc<MemoryStore>, Commands, BoardId, Vec<ColumnId>) {
        let store = Arc::new(MemoryStore::new());
        let commands = Commands::new(store.clone(), UserId::new(), Arc::new(ClientConfig::default()));
        let board = commands.create_board(true, None).await.unwrap();
        let docs = store.query(&Query::collection(schema::columns(board))).await.unwrap();
        let mut columns = codec::decode_columns(&docs);
        taskweb_types::sort_columns(&mut columns);
        (store, commands, board, columns.into_iter().map(|c| c.id).collect())
    }

    #[tokio::test]
    async fn test_empty_reorder_writes_nothing() {
        let (store, commands, board, _) = setup().await;
        store.clear_write_log();
        commands.reorder_columns(board, &[]).await.unwrap();
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let (store, commands, board, cols) = setup().await;
        store.clear_write_log();
        let err = commands.reorder_columns(board, &[cols[0], cols[1], cols[0]]).await;
        assert!(matches!(err, Err(BoardError::Invalid(_))));
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_reorder_with_deleted_column_applies_nothing() {
        let (store, commands, board, cols) = setup().await;
        store.clear_write_log();
        let err = commands.reorder_columns(board, &[cols[2], ColumnId::new(), cols[0]]).await;
        assert!(matches!(err, Err(BoardError::NotFound(_))));
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_apply_reorder_dispatches_move() {
        let (store, commands, board, cols) = setup().await;
        let task = commands.create_task(board, TaskDraft::new(cols[0], "t")).await.unwrap();
        commands
            .apply_reorder(board, ReorderEvent::TaskMoved { task, column: cols[1], index: 4 })
            .await
            .unwrap();
        let doc = store.document(&schema::task(board, task)).unwrap();
        assert_eq!(doc.get(field::ORDER), Some(&serde_json::json!(4)));
        assert_eq!(doc.get(field::COLUMN_ID), Some(&serde_json::json!(cols[1])));
    }
}
