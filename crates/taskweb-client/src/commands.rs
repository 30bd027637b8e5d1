//! User-facing mutations.
//!
//! Commands write to the store and return once the store acknowledges. They
//! never touch [`AppState`](crate::AppState): local state changes only when
//! the resulting snapshot comes back through a listener.
//!
//! Lock commands live in [`locks`](crate::locks), reordering in
//! [`reorder`](crate::reorder).

use std::sync::Arc;

use taskweb_store::{DocumentStore, Fields, Query, SetMode, WriteBatch};
use taskweb_types::{Board, BoardId, BoardPatch, ColumnId, ColumnPatch, TaskDraft, TaskId, UserId};
use tracing::{debug, info};

use crate::codec;
use crate::config::ClientConfig;
use crate::constants::COLLABORATIVE_NAME_PREFIX;
use crate::dashboard::calendar_date;
use crate::error::{BoardError, ConflictKind, Result};
use crate::schema::{self, field};

/// Store-backed command set for one signed-in user.
#[derive(Clone)]
pub struct Commands {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) user: UserId,
    pub(crate) config: Arc<ClientConfig>,
}

/// Trim a title and reject it if nothing is left.
pub(crate) fn required_title(title: &str, what: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BoardError::Invalid(format!("{what} is required")));
    }
    Ok(title.to_string())
}

impl Commands {
    pub fn new(store: Arc<dyn DocumentStore>, user: UserId, config: Arc<ClientConfig>) -> Self {
        Self { store, user, config }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ── Boards ──────────────────────────────────────────────────────────────

    /// Point read of a board as seen by this user.
    pub async fn fetch_board(&self, id: BoardId) -> Result<Board> {
        let doc = self
            .store
            .get(&schema::board(id))
            .await?
            .ok_or_else(|| BoardError::NotFound(format!("board {id}")))?;
        Ok(codec::decode_board(&doc, self.user)?)
    }

    /// Create a board together with its default columns, in one batch.
    ///
    /// A user may own only one solo board. Unnamed boards get the configured
    /// solo name, or a dated collaborative name.
    pub async fn create_board(&self, collaborative: bool, name: Option<&str>) -> Result<BoardId> {
        if !collaborative {
            let existing = self
                .store
                .query(
                    &Query::collection(schema::boards())
                        .where_eq(field::OWNER, self.user)
                        .where_eq(field::IS_COLLABORATIVE, false),
                )
                .await?;
            if !existing.is_empty() {
                return Err(ConflictKind::SoloBoardExists.into());
            }
        }

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None if collaborative => {
                let date = calendar_date(self.store.now_millis())
                    .map(|d| d.format(crate::constants::DATE_FORMAT).to_string())
                    .unwrap_or_default();
                format!("{COLLABORATIVE_NAME_PREFIX} {date}").trim_end().to_string()
            }
            None => self.config.default_solo_name.clone(),
        };

        let id = BoardId::new();
        let mut batch = WriteBatch::new();
        batch.set(
            schema::board(id),
            Fields::new()
                .set(field::NAME, &name)
                .set(field::OWNER, self.user)
                .set(field::IS_COLLABORATIVE, collaborative)
                .server_timestamp(field::CREATED_AT)
                .server_timestamp(field::UPDATED_AT),
            SetMode::Replace,
        );
        for (order, title) in self.config.default_columns.iter().enumerate() {
            batch.set(
                schema::column(id, ColumnId::new()),
                Fields::new()
                    .set(field::TITLE, title)
                    .set(field::ORDER, order as i64)
                    .server_timestamp(field::CREATED_AT)
                    .server_timestamp(field::UPDATED_AT),
                SetMode::Replace,
            );
        }
        self.store.commit(batch).await?;

        info!(board = %id, collaborative, name = %name, "created board");
        Ok(id)
    }

    /// Rename a board.
    pub async fn update_board(&self, id: BoardId, patch: BoardPatch) -> Result<()> {
        let mut fields = Fields::new().server_timestamp(field::UPDATED_AT);
        if let Some(name) = patch.name {
            fields = fields.set(field::NAME, required_title(&name, "board name")?);
        }
        self.store.update(&schema::board(id), fields).await?;
        debug!(board = %id, "updated board");
        Ok(())
    }

    /// This user's boards, newest first.
    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let docs = self
            .store
            .query(
                &Query::collection(schema::boards())
                    .where_eq(field::OWNER, self.user)
                    .order_by(field::CREATED_AT, taskweb_store::Direction::Descending),
            )
            .await?;
        Ok(codec::decode_boards(&docs, self.user))
    }

    /// Delete a board with all of its columns and tasks. Owner only.
    ///
    /// Tasks and columns go in one batch; the board document follows.
    pub async fn delete_board(&self, id: BoardId) -> Result<()> {
        let board = self.fetch_board(id).await?;
        if !board.is_owner {
            return Err(BoardError::AccessDenied(format!("only the owner can delete board {id}")));
        }

        let tasks = self.store.query(&Query::collection(schema::tasks(id))).await?;
        let columns = self.store.query(&Query::collection(schema::columns(id))).await?;
        let mut batch = WriteBatch::new();
        for doc in tasks.iter().chain(columns.iter()) {
            batch.delete(doc.path.clone());
        }
        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        self.store.delete(&schema::board(id)).await?;

        info!(board = %id, tasks = tasks.len(), columns = columns.len(), "deleted board");
        Ok(())
    }

    // ── Columns ─────────────────────────────────────────────────────────────

    /// Append a column at `max(order) + 1`. Owner only.
    ///
    /// The maximum is scanned at call time; two concurrent creates may land
    /// on the same order, which display tie-breaking absorbs.
    pub async fn create_column(&self, board_id: BoardId, title: &str) -> Result<ColumnId> {
        let title = required_title(title, "column title")?;
        let board = self.fetch_board(board_id).await?;
        if !board.is_owner {
            return Err(BoardError::AccessDenied(format!(
                "only the owner can add columns to board {board_id}"
            )));
        }

        let docs = self.store.query(&Query::collection(schema::columns(board_id))).await?;
        let max_order = codec::decode_columns(&docs).iter().map(|c| c.order).fold(-1, i64::max);

        let id = ColumnId::new();
        self.store
            .set(
                &schema::column(board_id, id),
                Fields::new()
                    .set(field::TITLE, &title)
                    .set(field::ORDER, max_order + 1)
                    .server_timestamp(field::CREATED_AT)
                    .server_timestamp(field::UPDATED_AT),
                SetMode::Replace,
            )
            .await?;

        debug!(board = %board_id, column = %id, order = max_order + 1, "created column");
        Ok(id)
    }

    pub async fn update_column(&self, board_id: BoardId, id: ColumnId, patch: ColumnPatch) -> Result<()> {
        let mut fields = Fields::new().server_timestamp(field::UPDATED_AT);
        if let Some(title) = patch.title {
            fields = fields.set(field::TITLE, required_title(&title, "column title")?);
        }
        self.store.update(&schema::column(board_id, id), fields).await?;
        Ok(())
    }

    /// Delete an empty column; `Conflict(ColumnNotEmpty)` otherwise.
    pub async fn delete_column(&self, board_id: BoardId, id: ColumnId) -> Result<()> {
        let holding = self
            .store
            .query(&Query::collection(schema::tasks(board_id)).where_eq(field::COLUMN_ID, id))
            .await?;
        if !holding.is_empty() {
            return Err(ConflictKind::ColumnNotEmpty.into());
        }
        self.store.delete(&schema::column(board_id, id)).await?;
        debug!(board = %board_id, column = %id, "deleted column");
        Ok(())
    }

    // ── Tasks ───────────────────────────────────────────────────────────────

    /// Create a task at the tail of its column, unlocked.
    pub async fn create_task(&self, board_id: BoardId, draft: TaskDraft) -> Result<TaskId> {
        let title = required_title(&draft.title, "title")?;

        let siblings = self
            .store
            .query(&Query::collection(schema::tasks(board_id)).where_eq(field::COLUMN_ID, draft.column_id))
            .await?;
        let max_order = codec::decode_tasks(&siblings).iter().map(|t| t.order).fold(-1, i64::max);

        let mut fields = Fields::new()
            .set(field::COLUMN_ID, draft.column_id)
            .set(field::TITLE, &title)
            .set(field::DESCRIPTION, draft.description.trim())
            .set(field::PRIORITY, draft.priority)
            .set(field::ORDER, max_order + 1)
            .set(field::CREATED_BY, self.user)
            .set(field::LOCKED_BY, serde_json::Value::Null)
            .server_timestamp(field::CREATED_AT)
            .server_timestamp(field::UPDATED_AT);
        if let Some(due) = draft.due_date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            fields = fields.set(field::DUE_DATE, due);
        }

        let id = TaskId::new();
        self.store.set(&schema::task(board_id, id), fields, SetMode::Replace).await?;
        debug!(board = %board_id, task = %id, column = %draft.column_id, "created task");
        Ok(id)
    }

    /// Delete a task. Deleting an absent task succeeds.
    pub async fn delete_task(&self, board_id: BoardId, id: TaskId) -> Result<()> {
        self.store.delete(&schema::task(board_id, id)).await?;
        debug!(board = %board_id, task = %id, "deleted task");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use taskweb_store::{ManualClock, MemoryStore, WriteKind};
    use taskweb_types::Priority;

    // 2024-03-05T12:00:00Z
    const NOON: u64 = 1_709_640_000_000;

    fn setup() -> (Arc<MemoryStore>, Commands) {
        let store = Arc::new(MemoryStore::with_clock(Arc::new(ManualClock::new(NOON))));
        let commands = Commands::new(store.clone(), UserId::new(), Arc::new(ClientConfig::default()));
        (store, commands)
    }

    async fn column_titles(commands: &Commands, board: BoardId) -> Vec<(String, i64)> {
        let docs = commands.store.query(&Query::collection(schema::columns(board))).await.unwrap();
        let mut cols = codec::decode_columns(&docs);
        taskweb_types::sort_columns(&mut cols);
        cols.into_iter().map(|c| (c.title, c.order)).collect()
    }

    #[tokio::test]
    async fn test_create_board_writes_defaults_in_one_batch() {
        let (store, commands) = setup();
        let id = commands.create_board(false, None).await.unwrap();

        let board = commands.fetch_board(id).await.unwrap();
        assert_eq!(board.name, "My Solo Board");
        assert!(board.is_owner);
        assert_eq!(board.created_at, Some(NOON));
        assert_eq!(
            column_titles(&commands, id).await,
            vec![("To Do".into(), 0), ("In Progress".into(), 1), ("Done".into(), 2)]
        );
        assert_eq!(store.write_log().len(), 4);
    }

    #[tokio::test]
    async fn test_collaborative_default_name_is_dated() {
        let (_store, commands) = setup();
        let id = commands.create_board(true, Some("   ")).await.unwrap();
        let board = commands.fetch_board(id).await.unwrap();
        assert_eq!(board.name, "Collaborative Board 2024-03-05");
        assert!(board.is_collaborative);
    }

    #[tokio::test]
    async fn test_second_solo_board_conflicts() {
        let (_store, commands) = setup();
        commands.create_board(false, None).await.unwrap();
        let err = commands.create_board(false, Some("Another")).await.unwrap_err();
        assert_eq!(err, BoardError::Conflict(ConflictKind::SoloBoardExists));
        // Collaborative boards are unlimited
        commands.create_board(true, None).await.unwrap();
        commands.create_board(true, None).await.unwrap();
        assert_eq!(commands.list_boards().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_list_boards_newest_first_and_own_only() {
        let clock = Arc::new(ManualClock::new(NOON));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let config = Arc::new(ClientConfig::default());
        let me = Commands::new(store.clone(), UserId::new(), config.clone());
        let other = Commands::new(store.clone(), UserId::new(), config);

        let first = me.create_board(true, Some("first")).await.unwrap();
        clock.advance(std::time::Duration::from_secs(1));
        let second = me.create_board(true, Some("second")).await.unwrap();
        other.create_board(true, Some("theirs")).await.unwrap();

        let ids: Vec<BoardId> = me.list_boards().await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn test_create_column_appends_after_max() {
        let (_store, commands) = setup();
        let board = commands.create_board(true, None).await.unwrap();
        commands.create_column(board, "  Review ").await.unwrap();
        let titles = column_titles(&commands, board).await;
        assert_eq!(titles.last(), Some(&("Review".to_string(), 3)));
    }

    #[tokio::test]
    async fn test_create_column_on_empty_board_starts_at_zero() {
        let store = Arc::new(MemoryStore::new());
        let config = Arc::new(ClientConfig { default_columns: Vec::new(), ..ClientConfig::default() });
        let commands = Commands::new(store, UserId::new(), config);
        let board = commands.create_board(true, None).await.unwrap();
        commands.create_column(board, "First").await.unwrap();
        assert_eq!(column_titles(&commands, board).await, vec![("First".into(), 0)]);
    }

    #[tokio::test]
    async fn test_create_column_owner_only_and_titled() {
        let (store, owner) = setup();
        let board = owner.create_board(true, None).await.unwrap();
        let guest = Commands::new(store, UserId::new(), owner.config.clone());

        assert!(matches!(guest.create_column(board, "Mine").await, Err(BoardError::AccessDenied(_))));
        assert!(matches!(owner.create_column(board, "  ").await, Err(BoardError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_delete_column_refuses_non_empty() {
        let (_store, commands) = setup();
        let board = commands.create_board(true, None).await.unwrap();
        let column = commands.create_column(board, "Temp").await.unwrap();
        let task = commands.create_task(board, TaskDraft::new(column, "t")).await.unwrap();

        let err = commands.delete_column(board, column).await.unwrap_err();
        assert_eq!(err, BoardError::Conflict(ConflictKind::ColumnNotEmpty));

        commands.delete_task(board, task).await.unwrap();
        commands.delete_column(board, column).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_task_appends_to_column_tail() {
        let (store, commands) = setup();
        let board = commands.create_board(true, None).await.unwrap();
        let column = commands.create_column(board, "Work").await.unwrap();

        commands.create_task(board, TaskDraft::new(column, "a")).await.unwrap();
        let id = commands
            .create_task(
                board,
                TaskDraft::new(column, " b ").with_priority(Priority::High).with_due_date(""),
            )
            .await
            .unwrap();

        let doc = store.document(&schema::task(board, id)).unwrap();
        assert_eq!(doc.get(field::ORDER), Some(&serde_json::json!(1)));
        assert_eq!(doc.get(field::TITLE), Some(&serde_json::json!("b")));
        assert_eq!(doc.get(field::PRIORITY), Some(&serde_json::json!("high")));
        assert_eq!(doc.get(field::LOCKED_BY), Some(&serde_json::Value::Null));
        assert!(doc.get(field::DUE_DATE).is_none());
    }

    #[tokio::test]
    async fn test_create_task_requires_title() {
        let (store, commands) = setup();
        let err = commands.create_task(BoardId::new(), TaskDraft::new(ColumnId::new(), " ")).await;
        assert!(matches!(err, Err(BoardError::Invalid(_))));
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_delete_board_removes_everything() {
        let (store, commands) = setup();
        let board = commands.create_board(true, None).await.unwrap();
        let columns = column_titles(&commands, board).await;
        assert_eq!(columns.len(), 3);
        let docs = store.query(&Query::collection(schema::columns(board))).await.unwrap();
        let column = codec::decode_columns(&docs)[0].id;
        commands.create_task(board, TaskDraft::new(column, "t")).await.unwrap();
        store.clear_write_log();

        commands.delete_board(board).await.unwrap();

        assert!(store.document(&schema::board(board)).is_none());
        assert!(column_titles(&commands, board).await.is_empty());
        let deletes = store.write_log().iter().filter(|w| w.kind == WriteKind::Delete).count();
        assert_eq!(deletes, 5);
    }

    #[tokio::test]
    async fn test_delete_board_owner_only() {
        let (store, owner) = setup();
        let board = owner.create_board(true, None).await.unwrap();
        let guest = Commands::new(store.clone(), UserId::new(), owner.config.clone());
        assert!(matches!(guest.delete_board(board).await, Err(BoardError::AccessDenied(_))));
        assert!(store.document(&schema::board(board)).is_some());
    }

    #[tokio::test]
    async fn test_update_missing_board_is_not_found() {
        let (_store, commands) = setup();
        let err = commands
            .update_board(BoardId::new(), BoardPatch { name: Some("x".into()) })
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::NotFound(_)));
    }
}
